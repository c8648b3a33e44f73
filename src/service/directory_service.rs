//! Alumni directory service.

use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::{AlumniProfile, Squadron, UserId};
use crate::error::ApiError;
use crate::persistence::Record;

/// Editable profile fields.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileInput {
    /// Name shown in the directory.
    pub display_name: String,
    /// Squadron affiliation.
    pub squadron: Option<Squadron>,
    /// Graduation year.
    pub graduation_year: Option<u16>,
    /// City or country.
    pub location: Option<String>,
    /// Skills.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Interests.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Short biography.
    pub bio: Option<String>,
    /// Employer.
    pub current_company: Option<String>,
    /// Role at the employer.
    pub job_title: Option<String>,
    /// Listed in the public directory (default `true`).
    #[serde(default = "default_public")]
    pub is_public: bool,
    /// Open to mentoring requests.
    #[serde(default)]
    pub available_for_mentoring: bool,
}

const fn default_public() -> bool {
    true
}

/// Query of `GET /alumni`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DirectoryQuery {
    /// Case-insensitive substring of name, company, job title, bio or skills.
    pub search: Option<String>,
    /// Only this squadron.
    pub squadron: Option<Squadron>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    /// Only this graduation year.
    pub graduation_year: Option<u16>,
    /// Has this skill (case-insensitive, exact).
    pub skill: Option<String>,
    /// Only mentors.
    pub mentoring: Option<bool>,
    /// Include hidden profiles (admins only).
    #[serde(default)]
    pub include_private: bool,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

impl DirectoryQuery {
    fn matches(&self, profile: &AlumniProfile, show_private: bool) -> bool {
        if !profile.is_public && !show_private {
            return false;
        }
        if let Some(needle) = non_blank(self.search.as_deref())
            && !profile.matches_search(&needle)
        {
            return false;
        }
        if self.squadron.is_some_and(|s| profile.squadron != Some(s)) {
            return false;
        }
        if let Some(location) = non_blank(self.location.as_deref())
            && !profile
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&location))
        {
            return false;
        }
        if self
            .graduation_year
            .is_some_and(|y| profile.graduation_year != Some(y))
        {
            return false;
        }
        if let Some(skill) = non_blank(self.skill.as_deref())
            && !profile.skills.iter().any(|s| s.to_lowercase() == skill)
        {
            return false;
        }
        if self
            .mentoring
            .is_some_and(|m| profile.available_for_mentoring != m)
        {
            return false;
        }
        true
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !out.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            out.push(value);
        }
    }
    out
}

fn build_profile(user_id: UserId, input: ProfileInput) -> AlumniProfile {
    let trim = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    AlumniProfile {
        user_id,
        display_name: input.display_name.trim().to_string(),
        squadron: input.squadron,
        graduation_year: input.graduation_year,
        location: trim(input.location),
        skills: clean_list(input.skills),
        interests: clean_list(input.interests),
        bio: trim(input.bio),
        current_company: trim(input.current_company),
        job_title: trim(input.job_title),
        is_public: input.is_public,
        available_for_mentoring: input.available_for_mentoring,
        updated_at: Utc::now(),
    }
}

/// Directory operations.
#[derive(Debug, Clone)]
pub struct DirectoryService {
    ctx: ServiceContext,
}

impl DirectoryService {
    /// Creates a new `DirectoryService`.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates or replaces the caller's own profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for invalid fields.
    pub async fn upsert_own(
        &self,
        auth: &AuthUser,
        input: ProfileInput,
    ) -> Result<AlumniProfile, ApiError> {
        self.store_profile(auth.id, input).await
    }

    /// Replaces any member's profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::InvalidRequest`] for invalid fields.
    pub async fn admin_update(
        &self,
        admin: &AuthUser,
        user_id: UserId,
        input: ProfileInput,
    ) -> Result<AlumniProfile, ApiError> {
        admin.require_admin()?;
        let profile = self.store_profile(user_id, input).await?;
        tracing::info!(%user_id, admin = %admin.id, "profile edited by admin");
        Ok(profile)
    }

    async fn store_profile(
        &self,
        user_id: UserId,
        input: ProfileInput,
    ) -> Result<AlumniProfile, ApiError> {
        let profile = build_profile(user_id, input);
        profile.validate()?;
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        {
            state.profiles.insert(user_id, profile.clone());
        }
        outbox.save(Record::Profile(profile.clone()));
        self.ctx.commit(state, outbox).await;
        tracing::debug!(%user_id, public = profile.is_public, "profile saved");
        Ok(profile)
    }

    /// One profile. Hidden profiles are visible to their owner and admins
    /// only.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ProfileNotFound`].
    pub async fn get(
        &self,
        viewer: Option<&AuthUser>,
        user_id: UserId,
    ) -> Result<AlumniProfile, ApiError> {
        let state = self.ctx.store.read().await;
        let profile = state
            .profiles
            .get(&user_id)
            .ok_or(ApiError::ProfileNotFound(*user_id.as_uuid()))?;
        let privileged = viewer.is_some_and(|v| v.id == user_id || v.is_admin());
        if !profile.is_public && !privileged {
            return Err(ApiError::ProfileNotFound(*user_id.as_uuid()));
        }
        Ok(profile.clone())
    }

    /// Filtered, paginated directory sorted by name.
    pub async fn list(
        &self,
        viewer: Option<&AuthUser>,
        query: &DirectoryQuery,
    ) -> Page<AlumniProfile> {
        let show_private = query.include_private && viewer.is_some_and(AuthUser::is_admin);
        let limit = query
            .limit
            .unwrap_or(super::event_service::DEFAULT_LIMIT)
            .clamp(1, super::event_service::MAX_LIMIT);
        let state = self.ctx.store.read().await;
        let mut hits: Vec<AlumniProfile> = state
            .profiles
            .values()
            .filter(|p| query.matches(p, show_private))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Page::slice(hits, query.offset, limit)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::alumni::tests::sample_profile;
    use crate::service::test_support::{context, user};

    fn input(name: &str, squadron: Squadron, public: bool) -> ProfileInput {
        ProfileInput {
            display_name: format!("  {name} "),
            squadron: Some(squadron),
            graduation_year: Some(2010),
            location: Some("Abuja".to_string()),
            skills: vec!["Rust".to_string(), "rust".to_string(), " ".to_string()],
            interests: vec![],
            bio: Some(String::new()),
            current_company: None,
            job_title: None,
            is_public: public,
            available_for_mentoring: false,
        }
    }

    #[tokio::test]
    async fn upsert_normalizes_fields() {
        let svc = DirectoryService::new(context());
        let Ok(profile) = svc
            .upsert_own(&user(Role::Member), input("Chidi", Squadron::Red, true))
            .await
        else {
            panic!("upsert failed");
        };
        assert_eq!(profile.display_name, "Chidi");
        assert_eq!(profile.skills, vec!["Rust".to_string()]);
        assert!(profile.bio.is_none());
    }

    #[tokio::test]
    async fn hidden_profiles_stay_hidden_from_the_public() {
        let svc = DirectoryService::new(context());
        let owner = user(Role::Member);
        assert!(
            svc.upsert_own(&owner, input("Hidden", Squadron::Blue, false))
                .await
                .is_ok()
        );
        assert!(matches!(
            svc.get(None, owner.id).await,
            Err(ApiError::ProfileNotFound(_))
        ));
        assert!(svc.get(Some(&owner), owner.id).await.is_ok());
        assert_eq!(svc.list(None, &DirectoryQuery::default()).await.total, 0);

        let admin_query = DirectoryQuery {
            include_private: true,
            ..DirectoryQuery::default()
        };
        assert_eq!(svc.list(Some(&user(Role::Admin)), &admin_query).await.total, 1);
        assert_eq!(svc.list(Some(&owner), &admin_query).await.total, 0);
    }

    #[test]
    fn directory_filters_combine() {
        let profile = sample_profile(UserId::new());
        let query = DirectoryQuery {
            search: Some("skyline".to_string()),
            squadron: Some(Squadron::Blue),
            location: Some("lag".to_string()),
            graduation_year: Some(2004),
            skill: Some("AVIATION".to_string()),
            mentoring: Some(true),
            ..DirectoryQuery::default()
        };
        assert!(query.matches(&profile, false));

        let other_squadron = DirectoryQuery {
            squadron: Some(Squadron::Green),
            ..query.clone()
        };
        assert!(!other_squadron.matches(&profile, false));
        let partial_skill = DirectoryQuery {
            skill: Some("avia".to_string()),
            ..query
        };
        assert!(!partial_skill.matches(&profile, false));
    }

    #[tokio::test]
    async fn only_admin_edits_other_profiles() {
        let svc = DirectoryService::new(context());
        let target = UserId::new();
        assert!(matches!(
            svc.admin_update(&user(Role::Organizer), target, input("X", Squadron::Red, true))
                .await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(
            svc.admin_update(&user(Role::Admin), target, input("X", Squadron::Red, true))
                .await
                .is_ok()
        );
    }
}
