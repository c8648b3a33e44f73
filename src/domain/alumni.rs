//! Alumni directory profiles.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;
use crate::error::ApiError;

/// Longest accepted bio, in characters.
pub const MAX_BIO_LEN: usize = 2_000;

/// Alumni sub-group affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Squadron {
    /// Blue squadron.
    Blue,
    /// Green squadron.
    Green,
    /// Purple squadron.
    Purple,
    /// Yellow squadron.
    Yellow,
    /// Red squadron.
    Red,
}

impl Squadron {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "BLUE",
            Self::Green => "GREEN",
            Self::Purple => "PURPLE",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }
}

impl fmt::Display for Squadron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Squadron {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BLUE" => Ok(Self::Blue),
            "GREEN" => Ok(Self::Green),
            "PURPLE" => Ok(Self::Purple),
            "YELLOW" => Ok(Self::Yellow),
            "RED" => Ok(Self::Red),
            other => Err(ApiError::InvalidRequest(format!("unknown squadron: {other}"))),
        }
    }
}

/// Directory entry owned 1:1 by a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlumniProfile {
    /// Owner.
    pub user_id: UserId,
    /// Name shown in the directory.
    pub display_name: String,
    /// Squadron affiliation.
    pub squadron: Option<Squadron>,
    /// Graduation year.
    pub graduation_year: Option<u16>,
    /// City / country.
    pub location: Option<String>,
    /// Professional skills.
    pub skills: Vec<String>,
    /// Personal interests.
    pub interests: Vec<String>,
    /// Short biography.
    pub bio: Option<String>,
    /// Employer.
    pub current_company: Option<String>,
    /// Role at the employer.
    pub job_title: Option<String>,
    /// Listed in the public directory.
    pub is_public: bool,
    /// Open to mentoring other alumni.
    pub available_for_mentoring: bool,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl AlumniProfile {
    /// Checks field-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an empty name, an overlong bio
    /// or an implausible graduation year.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.display_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "display_name is required".to_string(),
            ));
        }
        if self
            .bio
            .as_deref()
            .is_some_and(|bio| bio.chars().count() > MAX_BIO_LEN)
        {
            return Err(ApiError::InvalidRequest(format!(
                "bio must be at most {MAX_BIO_LEN} characters"
            )));
        }
        if let Some(year) = self.graduation_year
            && !(1950..=2100).contains(&year)
        {
            return Err(ApiError::InvalidRequest(format!(
                "graduation_year {year} is out of range"
            )));
        }
        Ok(())
    }

    /// Case-insensitive match of `needle` against name, company, job title,
    /// bio and skills. `needle` must already be lower-cased.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle);
        contains(&self.display_name)
            || self.current_company.as_deref().is_some_and(contains)
            || self.job_title.as_deref().is_some_and(contains)
            || self.bio.as_deref().is_some_and(contains)
            || self.skills.iter().any(|s| contains(s))
    }
}
