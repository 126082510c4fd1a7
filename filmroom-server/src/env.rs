use filmroom_common::policy::annotation::AnnotationPolicy;

use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "FILMROOM_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "FILMROOM_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "FILMROOM_DB_HOSTNAME";
const DB_PORT_VAR: &str = "FILMROOM_DB_PORT";
const DB_NAME_VAR: &str = "FILMROOM_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "FILMROOM_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "FILMROOM_DB_IDLE_TIMEOUT_SECS";

const HASHING_KEY_VAR: &str = "FILMROOM_HASHING_KEY_B64";
const TOKEN_SIGNING_KEY_VAR: &str = "FILMROOM_TOKEN_SIGNING_KEY_B64";
const HEALTH_ENDPOINT_KEY_VAR: &str = "FILMROOM_HEALTH_ENDPOINT_KEY";

const HASH_LENGTH_VAR: &str = "FILMROOM_HASH_LENGTH";
const HASH_ITERATIONS_VAR: &str = "FILMROOM_HASH_ITERATIONS";
const HASH_MEM_COST_KIB_VAR: &str = "FILMROOM_HASH_MEM_COST_KIB";
const HASH_THREADS_VAR: &str = "FILMROOM_HASH_THREADS";
const HASH_SALT_LENGTH_VAR: &str = "FILMROOM_HASH_SALT_LENGTH";

const ACCESS_TOKEN_LIFETIME_MINS_VAR: &str = "FILMROOM_ACCESS_TOKEN_LIFETIME_MINS";
const REFRESH_TOKEN_LIFETIME_DAYS_VAR: &str = "FILMROOM_REFRESH_TOKEN_LIFETIME_DAYS";

const STORAGE_ENABLED_VAR: &str = "FILMROOM_STORAGE_ENABLED";
const STORAGE_ROOT_VAR: &str = "FILMROOM_STORAGE_ROOT";
const STORAGE_PUBLIC_URL_VAR: &str = "FILMROOM_STORAGE_PUBLIC_URL";
const MAX_VIDEO_SIZE_BYTES_VAR: &str = "FILMROOM_MAX_VIDEO_SIZE_BYTES";
const MAX_DRILL_SIZE_BYTES_VAR: &str = "FILMROOM_MAX_DRILL_SIZE_BYTES";

const ANNOTATION_POLICY_VAR: &str = "FILMROOM_ANNOTATION_POLICY";
const COACH_VIEW_REQUIRES_APPROVAL_VAR: &str = "FILMROOM_COACH_VIEW_REQUIRES_APPROVAL";

const ACTIX_WORKER_COUNT_VAR: &str = "FILMROOM_ACTIX_WORKER_COUNT";

const LOG_LEVEL_VAR: &str = "FILMROOM_LOG_LEVEL";

const HASHING_KEY_SIZE: usize = 32;
const TOKEN_SIGNING_KEY_SIZE: usize = 64;

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout_secs: Duration,

    pub hashing_key: [u8; HASHING_KEY_SIZE],
    pub token_signing_key: [u8; TOKEN_SIGNING_KEY_SIZE],
    pub health_endpoint_key: String,

    pub hash_length: u32,
    pub hash_iterations: u32,
    pub hash_mem_cost_kib: u32,
    pub hash_threads: u32,
    pub hash_salt_length: u32,

    #[zeroize(skip)]
    pub access_token_lifetime: Duration,
    #[zeroize(skip)]
    pub refresh_token_lifetime: Duration,

    #[zeroize(skip)]
    pub storage_enabled: bool,
    #[zeroize(skip)]
    pub storage_root: String,
    #[zeroize(skip)]
    pub storage_public_url: String,
    #[zeroize(skip)]
    pub max_video_size_bytes: usize,
    #[zeroize(skip)]
    pub max_drill_size_bytes: usize,

    #[zeroize(skip)]
    pub annotation_policy: AnnotationPolicy,
    #[zeroize(skip)]
    pub coach_view_requires_approval: bool,

    #[zeroize(skip)]
    pub actix_worker_count: usize,

    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let annotation_policy = match std::env::var(ANNOTATION_POLICY_VAR) {
            Ok(policy) => AnnotationPolicy::from_str(&policy)
                .map_err(|_| ConfigError::invalid(ANNOTATION_POLICY_VAR))?,
            Err(_) => AnnotationPolicy::default(),
        };

        let inner = ConfigInner {
            db_username: db_var(DB_USERNAME_VAR, String::from("postgres"))?,
            db_password: db_var(DB_PASSWORD_VAR, String::new())?,
            db_hostname: db_var(DB_HOSTNAME_VAR, String::from("localhost"))?,
            db_port: db_var(DB_PORT_VAR, 5432)?,
            db_name: db_var(DB_NAME_VAR, String::from("filmroom"))?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            db_idle_timeout_secs: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            hashing_key: key_var(HASHING_KEY_VAR)?,
            token_signing_key: key_var(TOKEN_SIGNING_KEY_VAR)?,
            health_endpoint_key: if cfg!(test) {
                env_var_or(HEALTH_ENDPOINT_KEY_VAR, String::from("test-health-key"))
            } else {
                env_var(HEALTH_ENDPOINT_KEY_VAR)?
            },

            hash_length: env_var_or(HASH_LENGTH_VAR, 32),
            hash_iterations: env_var_or(HASH_ITERATIONS_VAR, if cfg!(test) { 1 } else { 18 }),
            hash_mem_cost_kib: env_var_or(
                HASH_MEM_COST_KIB_VAR,
                if cfg!(test) { 128 } else { 62500 },
            ),
            hash_threads: env_var_or(HASH_THREADS_VAR, if cfg!(test) { 1 } else { 2 }),
            hash_salt_length: env_var_or(HASH_SALT_LENGTH_VAR, 16),

            access_token_lifetime: Duration::from_secs(
                env_var_or(ACCESS_TOKEN_LIFETIME_MINS_VAR, 15) * 60,
            ),
            refresh_token_lifetime: Duration::from_secs(
                env_var_or(REFRESH_TOKEN_LIFETIME_DAYS_VAR, 30) * 86400,
            ),

            storage_enabled: if cfg!(test) {
                false
            } else {
                env_var_or(STORAGE_ENABLED_VAR, true)
            },
            storage_root: env_var_or(STORAGE_ROOT_VAR, String::from("./data")),
            storage_public_url: env_var_or(STORAGE_PUBLIC_URL_VAR, String::from("/files")),
            max_video_size_bytes: env_var_or(MAX_VIDEO_SIZE_BYTES_VAR, 500 * 1024 * 1024),
            max_drill_size_bytes: env_var_or(MAX_DRILL_SIZE_BYTES_VAR, 200 * 1024 * 1024),

            annotation_policy,
            coach_view_requires_approval: env_var_or(COACH_VIEW_REQUIRES_APPROVAL_VAR, true),

            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),

            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    pub fn database_uri(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_hostname, self.db_port, self.db_name,
        )
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::missing(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::invalid(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

/// Database settings are required when serving. Unit tests that never touch the database
/// fall back to local defaults.
fn db_var<T: FromStr>(key: &'static str, test_default: T) -> Result<T, ConfigError> {
    if cfg!(test) {
        Ok(env_var_or(key, test_default))
    } else {
        env_var(key)
    }
}

fn key_var<const N: usize>(key: &'static str) -> Result<[u8; N], ConfigError> {
    let encoded = match std::env::var(key) {
        Ok(k) => Zeroizing::new(k),
        Err(_) if cfg!(test) => return Ok([0x5a; N]),
        Err(_) => return Err(ConfigError::missing(key)),
    };

    let decoded = Zeroizing::new(
        b64.decode(encoded.as_bytes())
            .map_err(|_| ConfigError::invalid(key))?,
    );

    decoded
        .get(..N)
        .and_then(|k| k.try_into().ok())
        .ok_or(ConfigError::invalid(key))
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl ConfigError {
    fn missing(var_name: &'static str) -> Self {
        Self::MissingVar(var_name)
    }

    fn invalid(var_name: &'static str) -> Self {
        Self::InvalidVar(var_name)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use filmroom_common::db::{create_db_async_pool, DbAsyncPool};
    use filmroom_common::storage::mock::MockFileStore;
    use filmroom_common::storage::FileStorage;

    use std::sync::Arc;

    use super::*;

    pub static DB_ASYNC_POOL: Lazy<DbAsyncPool> = Lazy::new(|| {
        futures::executor::block_on(create_db_async_pool(
            &CONF.database_uri(),
            CONF.db_max_connections,
            CONF.db_idle_timeout_secs,
        ))
        .expect("Failed to create async DB pool for tests")
    });

    pub static FILE_STORE: Lazy<Arc<FileStorage>> =
        Lazy::new(|| Arc::new(Box::new(MockFileStore::new())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_var_rejects_short_key() {
        const SHORT_KEY_VAR: &str = "FILMROOM_TEST_SHORT_KEY_B64";
        std::env::set_var(SHORT_KEY_VAR, b64.encode([1u8; 8]));

        assert!(matches!(
            key_var::<32>(SHORT_KEY_VAR),
            Err(ConfigError::InvalidVar(SHORT_KEY_VAR))
        ));
        assert_eq!(key_var::<8>(SHORT_KEY_VAR).unwrap(), [1u8; 8]);

        std::env::remove_var(SHORT_KEY_VAR);
    }

    #[test]
    fn test_env_var_or_falls_back_on_garbage() {
        const GARBAGE_VAR: &str = "FILMROOM_TEST_GARBAGE_NUMBER";
        std::env::set_var(GARBAGE_VAR, "twelve");

        assert_eq!(env_var_or(GARBAGE_VAR, 12u32), 12);
        assert!(matches!(
            env_var::<u32>(GARBAGE_VAR),
            Err(ConfigError::InvalidVar(GARBAGE_VAR))
        ));

        std::env::remove_var(GARBAGE_VAR);
    }
}
