//! Configuration types.
//!
//! Built once at startup from the environment and passed by reference into
//! the mailbox and tracker constructors. Nothing below `main` reads the
//! environment.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::scheduler::CronSchedule;

const DEFAULT_JIRA_API_VERSION: &str = "2";
const DEFAULT_NEW_ISSUE_TEMPLATE: &str = "structure_new_issue.json";
const DEFAULT_ADD_COMMENT_TEMPLATE: &str = "structure_add_comment.json";
const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_IMAP_FOLDER: &str = "INBOX";
/// IMAP keyword marking a message as synchronized. Distinct from `\Seen`,
/// which mail clients also set for unrelated reasons.
const DEFAULT_PROCESSED_KEYWORD: &str = "$TicketSynced";
/// Every five minutes (six-field cron, seconds first).
const DEFAULT_CRON: &str = "0 */5 * * * *";

/// Issue tracker (Jira REST) settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL, without trailing slash, e.g. `https://jira.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    pub api_version: String,
    pub new_issue_template: String,
    pub add_comment_template: String,
}

/// Mailbox (IMAP) settings.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub folder: String,
    pub processed_keyword: String,
    /// When set, processed messages are also moved here.
    pub done_folder: Option<String>,
}

/// When to run.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cron: CronSchedule,
    /// Run a single cycle and exit.
    pub run_once: bool,
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub tracker: TrackerConfig,
    pub mailbox: MailboxConfig,
    pub schedule: ScheduleConfig,
}

impl BridgeConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let tracker = TrackerConfig {
            base_url: env.required("JIRA_URL")?.trim_end_matches('/').to_string(),
            username: env.required("JIRA_USER")?,
            password: SecretString::from(env.required("JIRA_PASSWORD")?),
            api_version: env.or("JIRA_API_VERSION", DEFAULT_JIRA_API_VERSION),
            new_issue_template: env.or("JIRA_NEW_ISSUE_TEMPLATE", DEFAULT_NEW_ISSUE_TEMPLATE),
            add_comment_template: env.or("JIRA_ADD_COMMENT_TEMPLATE", DEFAULT_ADD_COMMENT_TEMPLATE),
        };

        let port = match env.optional("IMAP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "IMAP_PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_IMAP_PORT,
        };

        let processed_keyword = env.or("IMAP_PROCESSED_KEYWORD", DEFAULT_PROCESSED_KEYWORD);
        if !is_valid_keyword(&processed_keyword) {
            return Err(ConfigError::InvalidValue {
                key: "IMAP_PROCESSED_KEYWORD".into(),
                message: format!("{processed_keyword:?} is not a valid IMAP keyword"),
            });
        }

        let mailbox = MailboxConfig {
            host: env.required("IMAP_SERVER")?,
            port,
            username: env.required("IMAP_USER")?,
            password: SecretString::from(env.required("IMAP_PASSWORD")?),
            folder: env.or("IMAP_FOLDER", DEFAULT_IMAP_FOLDER),
            processed_keyword,
            done_folder: env.optional("IMAP_DONE_FOLDER"),
        };

        let cron_expr = env.or("CRON", DEFAULT_CRON);
        let schedule = ScheduleConfig {
            cron: CronSchedule::parse(&cron_expr)?,
            run_once: env
                .optional("RUN_ONCE")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        };

        Ok(Self {
            tracker,
            mailbox,
            schedule,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value, trimmed.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

/// IMAP `flag-keyword` atom, optionally `$`-prefixed. System flags (`\Seen`) are refused.
fn is_valid_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword
            .chars()
            .all(|c| c.is_ascii_graphic() && !"(){%*\"\\]".contains(c))
}
