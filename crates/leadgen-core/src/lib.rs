//! Domain types and configuration shared by every `leadgen` crate.

use thiserror::Error;

/// Declares a closed set of string-backed variants with `as_str`,
/// `Display`, and `FromStr` that agree with the serde representation.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::CoreError::InvalidValue {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod analytics;
pub mod app_config;
pub mod campaigns;
pub mod config;
pub mod jobs;
pub mod leads;
pub mod platform;
pub mod webhooks;

pub use analytics::{DailyLeads, LeadAnalytics, PlatformCount, ANALYTICS_WINDOW_DAYS};
pub use app_config::{AppConfig, Environment};
pub use campaigns::{
    Campaign, CampaignStatus, Frequency, LinkedInConfig, PlatformConfig, PlatformConfiguration,
    RedditConfig, ScrapeTarget, TargetCriteria, WebsiteConfig, WebsiteTarget,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{Job, JobStats, JobStatus, JobType};
pub use leads::{CandidateLead, EnrichmentStatus, Lead, LeadFilter, LeadStatus, LeadUpdate};
pub use platform::Platform;
pub use webhooks::{CrawlerEventType, WebhookConfig, WebhookDelivery};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {kind}: {value:?}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("invalid {platform} configuration: {reason}")]
    InvalidPlatformConfig { platform: Platform, reason: String },

    #[error("campaign must target at least one platform")]
    NoPlatforms,
}
