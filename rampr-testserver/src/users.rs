use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "superSecretAdminPassword123";

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: u64,
    pub username: String,
    pub name: String,
    /// `YYYY-MM-DDT00:00:00`.
    pub birthdate: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub birthdate: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreError {
    UsernameTaken,
    InvalidPassword,
    NotFound,
}

impl StoreError {
    pub(crate) fn detail(self) -> &'static str {
        match self {
            Self::UsernameTaken => "username is already taken",
            Self::InvalidPassword => "invalid password",
            Self::NotFound => "user not found",
        }
    }
}

#[derive(Debug)]
struct UserEntity {
    info: UserInfo,
    password: String,
}

#[derive(Debug)]
struct StoreInner {
    next_uid: u64,
    by_id: BTreeMap<u64, UserEntity>,
    by_username: HashMap<String, u64>,
}

/// In-memory user accounts. The admin account always has uid 1.
#[derive(Debug)]
pub struct UserStore {
    inner: Mutex<StoreInner>,
}

impl Default for UserStore {
    fn default() -> Self {
        let admin = UserEntity {
            info: UserInfo {
                uid: 1,
                username: ADMIN_USERNAME.to_string(),
                name: "admin".to_string(),
                birthdate: "2000-01-01T00:00:00".to_string(),
                role: UserRole::Admin,
            },
            password: ADMIN_PASSWORD.to_string(),
        };

        Self {
            inner: Mutex::new(StoreInner {
                next_uid: 2,
                by_username: HashMap::from([(ADMIN_USERNAME.to_string(), 1)]),
                by_id: BTreeMap::from([(1, admin)]),
            }),
        }
    }
}

impl UserStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(
        &self,
        req: RegisterRequest,
        birthdate: String,
    ) -> Result<UserInfo, StoreError> {
        if !is_valid_password(&req.password) {
            return Err(StoreError::InvalidPassword);
        }

        let mut inner = self.lock();
        if inner.by_username.contains_key(&req.username) {
            return Err(StoreError::UsernameTaken);
        }

        let uid = inner.next_uid;
        inner.next_uid += 1;

        let info = UserInfo {
            uid,
            username: req.username.clone(),
            name: req.name,
            birthdate,
            role: UserRole::User,
        };
        inner.by_username.insert(req.username, uid);
        inner.by_id.insert(
            uid,
            UserEntity {
                info: info.clone(),
                password: req.password,
            },
        );
        Ok(info)
    }

    /// Role of the account matching the credentials.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<UserRole> {
        let inner = self.lock();
        let uid = inner.by_username.get(username)?;
        inner
            .by_id
            .get(uid)
            .filter(|u| u.password == password)
            .map(|u| u.info.role)
    }

    pub fn get_by_id(&self, uid: u64) -> Option<UserInfo> {
        self.lock().by_id.get(&uid).map(|u| u.info.clone())
    }

    pub fn get_by_username(&self, username: &str) -> Option<UserInfo> {
        let inner = self.lock();
        let uid = inner.by_username.get(username)?;
        inner.by_id.get(uid).map(|u| u.info.clone())
    }

    pub(crate) fn promote(&self, uid: u64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let user = inner.by_id.get_mut(&uid).ok_or(StoreError::NotFound)?;
        user.info.role = UserRole::Admin;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN && password.chars().any(|c| c.is_ascii_digit())
}

/// Normalizes a `YYYY-MM-DD` date to `YYYY-MM-DDT00:00:00`.
pub(crate) fn parse_birthdate(raw: &str) -> Option<String> {
    let mut parts = raw.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }

    let year: u32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;

    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_month = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return None,
    };
    if day == 0 || day > days_in_month {
        return None;
    }

    Some(format!("{year:04}-{month:02}-{day:02}T00:00:00"))
}
