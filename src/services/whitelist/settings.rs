//! Per-call whitelist settings.
//!
//! Settings are resolved fresh on every authentication attempt: the caller-supplied overrides
//! are merged field-by-field over the known defaults and a new immutable value is returned.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::identity::{Identity, defaults_deep, truthy};
use super::outcome::Rejection;

/// Options handed to [`Strategy::authenticate`](super::Strategy::authenticate).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticateOptions {
    #[serde(default)]
    pub whitelist: Option<Value>,
}

impl AuthenticateOptions {
    pub fn new(whitelist: Value) -> Self {
        Self {
            whitelist: Some(whitelist),
        }
    }
}

/// One whitelisted address (exact or CIDR block) and the identity it resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    #[serde(alias = "ip")]
    pub address: String,
    #[serde(alias = "user")]
    pub identity: Identity,
}

impl WhitelistEntry {
    pub fn new(address: impl Into<String>, identity: Identity) -> Self {
        Self {
            address: address.into(),
            identity,
        }
    }
}

/// Which entry wins when several match the same address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The scan always walks the whole list; the last match is returned.
    #[default]
    Last,
    First,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub token_validation: bool,
    pub default_identity: Option<Identity>,
    pub users: Vec<WhitelistEntry>,
    pub unauthorized_message: Option<String>,
    pub match_policy: MatchPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_validation: false,
            default_identity: Some(Identity::default_template()),
            users: Vec::new(),
            unauthorized_message: None,
            match_policy: MatchPolicy::Last,
        }
    }
}

/// Legacy spellings accepted next to the current field names, as `(canonical, alias)`.
const SETTINGS_ALIASES: &[(&str, &str)] = &[("defaultIdentity", "defaultUser")];
const ENTRY_ALIASES: &[(&str, &str)] = &[("address", "ip"), ("identity", "user")];

/// Raw caller overrides. `Some(Value::Null)` means "explicitly null", `None` means "absent".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default, deserialize_with = "present")]
    token_validation: Option<Value>,
    #[serde(default, alias = "defaultUser", deserialize_with = "present")]
    default_identity: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    users: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    unauthorized_message: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    match_policy: Option<Value>,
}

fn present<'de, D>(d: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(d).map(Some)
}

impl Settings {
    /// Merge `overrides` over the defaults.
    ///
    /// A missing or non-array `users` list is a malformed configuration and is rejected here,
    /// before any matching happens. When a field is given under both its current name and its
    /// legacy alias, the current name wins.
    pub fn resolve(overrides: Option<&Value>) -> Result<Self, Rejection> {
        let raw = match overrides {
            None | Some(Value::Null) => RawSettings::default(),
            Some(Value::Object(fields)) => {
                let mut fields = fields.clone();
                drop_shadowed_aliases(&mut fields, SETTINGS_ALIASES);
                serde_json::from_value(Value::Object(fields)).map_err(|err| {
                    Rejection::bad_request(format!("Invalid whitelist options: {err}"))
                })?
            }
            Some(_) => {
                return Err(Rejection::bad_request(
                    "Whitelist options must be an object",
                ));
            }
        };

        let defaults = Settings::default();

        let token_validation = raw
            .token_validation
            .as_ref()
            .map_or(defaults.token_validation, truthy);

        let default_identity = match raw.default_identity {
            None => defaults.default_identity,
            Some(Value::Object(mut attrs)) => {
                let template = Identity::default_template();
                defaults_deep(&mut attrs, template.attributes());
                Some(Identity::from(attrs))
            }
            Some(_) => None,
        };

        let users = match raw.users {
            None => defaults.users,
            Some(Value::Null) => return Err(Rejection::bad_request("No IP whitelist provided")),
            Some(Value::Array(items)) => parse_entries(items),
            Some(_) => {
                return Err(Rejection::bad_request(
                    "Provided IP whitelist is not an array",
                ));
            }
        };

        let unauthorized_message = match raw.unauthorized_message {
            Some(Value::String(m)) if !m.is_empty() => Some(m),
            _ => defaults.unauthorized_message,
        };

        let match_policy = match raw.match_policy.as_ref() {
            None | Some(Value::Null) => defaults.match_policy,
            Some(Value::String(p)) if p == "last" => MatchPolicy::Last,
            Some(Value::String(p)) if p == "first" => MatchPolicy::First,
            Some(_) => return Err(Rejection::bad_request("Unknown whitelist match policy")),
        };

        Ok(Self {
            token_validation,
            default_identity,
            users,
            unauthorized_message,
            match_policy,
        })
    }
}

fn parse_entries(items: Vec<Value>) -> Vec<WhitelistEntry> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let item = match item {
                Value::Object(mut fields) => {
                    drop_shadowed_aliases(&mut fields, ENTRY_ALIASES);
                    Value::Object(fields)
                }
                other => other,
            };
            match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping malformed whitelist entry");
                    None
                }
            }
        })
        .collect()
}

/// Remove every alias whose canonical key is also present.
fn drop_shadowed_aliases(fields: &mut Map<String, Value>, aliases: &[(&str, &str)]) {
    for &(canonical, alias) in aliases {
        if fields.contains_key(canonical) && fields.remove(alias).is_some() {
            tracing::warn!(
                canonical,
                alias,
                "whitelist field given under both names; ignoring the alias"
            );
        }
    }
}
