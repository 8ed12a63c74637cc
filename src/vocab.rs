//! Fixed vocabularies the pipeline is built around: HTTP methods, the
//! suspicious-field list used by the Mass Assignment generator, the
//! sensitive-field list used by severity scoring, and the ID-name/UUID
//! patterns used by ID inference.

use once_cell::sync::Lazy;
use regex::Regex;

pub const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD", "PATCH"];

pub const DESTRUCTIVE_METHODS: &[&str] = &["DELETE"];

/// Fields injected by the Mass Assignment generator, each paired with a
/// heuristic privilege-escalation value (see `generator::mass_assignment_value`).
pub const SUSPICIOUS_FIELDS: &[&str] = &[
    "isAdmin",
    "is_admin",
    "admin",
    "role",
    "roles",
    "isOwner",
    "is_owner",
    "owner",
    "permissions",
    "permission",
    "accessLevel",
    "access_level",
    "privileges",
    "privilege",
    "superuser",
    "super_user",
    "isSuperuser",
    "is_superuser",
];

/// Case-insensitive substrings that mark a diff path as security-sensitive
/// for severity rule 2.
pub const SENSITIVE_FIELD_TOKENS: &[&str] = &[
    "ownerid",
    "owner_id",
    "userid",
    "user_id",
    "email",
    "role",
    "roles",
    "isadmin",
    "is_admin",
    "permissions",
    "accesslevel",
    "access_level",
];

/// Case-insensitive substrings that mark a parameter name as an identifier
/// for ID inference.
pub const ID_NAME_TOKENS: &[&str] = &[
    "id",
    "userid",
    "user_id",
    "projectid",
    "project_id",
    "accountid",
    "account_id",
    "resourceid",
    "resource_id",
];

pub static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid regex")
});

pub fn is_integer_literal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_uuid_literal(s: &str) -> bool {
    UUID_RE.is_match(s)
}

pub fn name_matches_id_vocab(name: &str) -> bool {
    let lower = name.to_lowercase();
    ID_NAME_TOKENS.iter().any(|tok| lower.contains(tok))
}

pub fn name_matches_sensitive_vocab(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_FIELD_TOKENS.iter().any(|tok| lower.contains(tok))
}

pub fn is_destructive(method: &str) -> bool {
    DESTRUCTIVE_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method))
}
