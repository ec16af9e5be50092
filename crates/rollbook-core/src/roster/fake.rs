//! In-memory backend for state machine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crate::api::{ApiError, Query, RosterBackend};
use crate::auth::SessionData;
use crate::models::{Identity, StudentFields, StudentRecord};

#[derive(Default)]
struct Inner {
    account: Option<(String, String)>,
    signed_in: Option<String>,
    documents: Vec<StudentRecord>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
    session_calls: AtomicUsize,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    fail_lists: AtomicBool,
    fail_creates: AtomicBool,
    fail_logout: AtomicBool,
}

impl FakeBackend {
    pub fn with_account(email: &str, password: &str) -> Self {
        let backend = Self::default();
        backend.inner.lock().unwrap().account = Some((email.to_string(), password.to_string()));
        backend
    }

    fn user_id(email: &str) -> String {
        format!("user-{}", email)
    }

    pub fn sign_in_directly(&self, email: &str) {
        self.inner.lock().unwrap().signed_in = Some(email.to_string());
    }

    pub fn has_session(&self) -> bool {
        self.inner.lock().unwrap().signed_in.is_some()
    }

    /// Store a document with the next id and a later creation time.
    pub fn seed(&self, student_number: &str) -> String {
        let fields = StudentFields {
            student_number: student_number.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            section: "1-A".to_string(),
            grade_level: Some(1),
        };
        self.insert(&fields).id
    }

    fn insert(&self, fields: &StudentFields) -> StudentRecord {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(inner.next_id as i64);
        let record = StudentRecord {
            id: format!("doc-{}", inner.next_id),
            created_at: Some(created_at),
            student_number: fields.student_number.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            section: fields.section.clone(),
            grade_level: fields.grade_level,
        };
        inner.documents.push(record.clone());
        record
    }

    /// Stored documents, newest first.
    pub fn documents(&self) -> Vec<StudentRecord> {
        let mut documents = self.inner.lock().unwrap().documents.clone();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    fn require_session(&self) -> Result<String, ApiError> {
        self.inner
            .lock()
            .unwrap()
            .signed_in
            .clone()
            .ok_or_else(|| ApiError::Unauthorized("No active session".to_string()))
    }
}

#[async_trait]
impl RosterBackend for FakeBackend {
    async fn create_password_session(&self, email: &str, password: &str) -> Result<SessionData, ApiError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        inner.signed_in = None;

        let matches = inner
            .account
            .as_ref()
            .map(|(e, p)| e == email && p == password)
            .unwrap_or(false);
        if !matches {
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }

        inner.signed_in = Some(email.to_string());
        let now = Utc::now();
        Ok(SessionData {
            session_id: "session-1".to_string(),
            user_id: Self::user_id(email),
            secret: "secret".to_string(),
            expire: now + Duration::days(365),
            created_at: now,
        })
    }

    fn delegated_login_url(&self, provider: &str, redirect: &str, scopes: &[String]) -> Result<String, ApiError> {
        Ok(format!(
            "https://service.test/v1/account/sessions/oauth2/{}?success={}&scopes={}",
            provider,
            redirect,
            scopes.join(",")
        ))
    }

    async fn current_identity(&self) -> Result<Identity, ApiError> {
        let email = self.require_session()?;
        Ok(Identity {
            id: Self::user_id(&email),
            email,
            name: String::new(),
        })
    }

    async fn delete_current_session(&self) -> Result<(), ApiError> {
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(ApiError::ServerError("unavailable".to_string()));
        }
        self.require_session()?;
        self.inner.lock().unwrap().signed_in = None;
        Ok(())
    }

    async fn list_students(&self, queries: &[Query]) -> Result<Vec<StudentRecord>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ApiError::ServerError("boom".to_string()));
        }
        assert_eq!(queries, [Query::order_desc(crate::api::CREATED_AT)]);
        Ok(self.documents())
    }

    async fn create_student(&self, fields: &StudentFields) -> Result<StudentRecord, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ApiError::BadRequest("Document is invalid".to_string()));
        }
        Ok(self.insert(fields))
    }

    async fn delete_student(&self, id: &str) -> Result<(), ApiError> {
        self.require_session()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        if inner.documents.len() == before {
            return Err(ApiError::NotFound(
                "Document with the requested ID could not be found.".to_string(),
            ));
        }
        Ok(())
    }
}
