//! Student grade levels.

use serde::{Deserialize, Serialize};

/// Error returned when a string is not a known grade.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid grade: {0}")]
pub struct GradeError(pub String);

/// A student's grade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "yearbook.grade", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    #[default]
    Freshman,
    Sophomore,
    Junior,
    Senior,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Freshman => write!(f, "freshman"),
            Self::Sophomore => write!(f, "sophomore"),
            Self::Junior => write!(f, "junior"),
            Self::Senior => write!(f, "senior"),
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "freshman" | "0" => Ok(Self::Freshman),
            "sophomore" | "1" => Ok(Self::Sophomore),
            "junior" | "2" => Ok(Self::Junior),
            "senior" | "3" => Ok(Self::Senior),
            _ => Err(GradeError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parse() {
        assert_eq!("senior".parse::<Grade>().unwrap(), Grade::Senior);
        assert_eq!("Junior".parse::<Grade>().unwrap(), Grade::Junior);
        assert_eq!("1".parse::<Grade>().unwrap(), Grade::Sophomore);
        assert!("alumni".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_default_is_freshman() {
        assert_eq!(Grade::default(), Grade::Freshman);
    }

    #[test]
    fn test_grade_serde() {
        assert_eq!(serde_json::to_string(&Grade::Senior).unwrap(), "\"senior\"");
        let grade: Grade = serde_json::from_str("\"freshman\"").unwrap();
        assert_eq!(grade, Grade::Freshman);
    }
}
