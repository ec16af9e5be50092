use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Treat a session as expired this long before the service does, so a
/// request never races the server-side expiry.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// A service session as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub user_id: String,
    pub secret: String,
    pub expire: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS) > self.expire
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expire - Utc::now()
    }

    /// Get days remaining until expiry (for display)
    pub fn days_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_days().max(0)
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Expired sessions are left on disk but not loaded.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            let data: SessionData = serde_json::from_str(&contents)
                .context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the session secret if a session is loaded
    pub fn secret(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.secret.as_str())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expire_in: Duration) -> SessionData {
        let now = Utc::now();
        SessionData {
            session_id: "sess1".to_string(),
            user_id: "user1".to_string(),
            secret: "s3cr3t".to_string(),
            expire: now + expire_in,
            created_at: now,
        }
    }

    #[test]
    fn test_session_data_expiry() {
        assert!(!sample(Duration::days(30)).is_expired());
        assert!(sample(Duration::seconds(10)).is_expired());
        assert!(sample(Duration::days(-1)).is_expired());
        assert_eq!(sample(Duration::days(-1)).days_until_expiry(), 0);
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().join("proj"));
        assert!(!session.load().unwrap());

        let data = sample(Duration::days(7));
        session.update(data.clone());
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().join("proj"));
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.data, Some(data));
        assert_eq!(reloaded.secret(), Some("s3cr3t"));

        reloaded.clear().unwrap();
        assert!(reloaded.data.is_none());
        assert!(reloaded.secret().is_none());
        let mut again = Session::new(dir.path().join("proj"));
        assert!(!again.load().unwrap());
    }

    #[test]
    fn test_expired_session_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(sample(Duration::days(-2)));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(!reloaded.load().unwrap());
        assert!(reloaded.data.is_none());
    }
}
