use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{Credentials, Units};

/// Every Flume response wraps its payload the same way.
#[derive(Deserialize, Debug)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub data: Vec<T>,
}

#[derive(Serialize, Debug)]
pub struct TokenRequest<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a Credentials> for TokenRequest<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        TokenRequest {
            grant_type: "password",
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            username: &credentials.username,
            password: &credentials.password,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Token {
    pub access_token: String,
}

#[derive(Deserialize, Debug)]
pub struct Me {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchDeviceRequest {
    pub include_user: bool,
    pub include_location: bool,
}

impl FetchDeviceRequest {
    pub fn detailed() -> Self {
        FetchDeviceRequest {
            include_user: true,
            include_location: true,
        }
    }

    pub fn params(&self) -> [(&'static str, bool); 2] {
        [
            ("user", self.include_user),
            ("location", self.include_location),
        ]
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Device {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string_or_number")]
    pub bridge_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub user: User,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Location,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct User {
    #[serde(default, deserialize_with = "nullable")]
    pub email_address: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Location {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub city: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "nullable")]
    pub building_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tz: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub queries: Vec<Query>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Query {
    pub bucket: Bucketing,
    pub since_datetime: String,
    pub until_datetime: String,
    pub request_id: String,
    pub units: Units,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucketing {
    #[serde(rename = "MIN")]
    Minute,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Bucket {
    pub value: f64,
    pub datetime: String,
}

/// One entry of a query response: request ids mapped to their buckets, in the
/// order the API sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult(pub Vec<(String, Vec<Bucket>)>);

impl<'de> Deserialize<'de> for QueryResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupVisitor;

        impl<'de> Visitor<'de> for GroupVisitor {
            type Value = QueryResult;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of request id to buckets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<QueryResult, A::Error> {
                let mut groups = Vec::with_capacity(map.size_hint().unwrap_or(1));
                while let Some((key, buckets)) = map.next_entry::<String, Vec<Bucket>>()? {
                    groups.push((key, buckets));
                }
                Ok(QueryResult(groups))
            }
        }

        deserializer.deserialize_map(GroupVisitor)
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Flume ids are 64-bit and show up both quoted and bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
    Text(String),
    Number(serde_json::Number),
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        match id {
            Id::Text(s) => s,
            Id::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Id::deserialize(deserializer)?.into())
}

fn nullable_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<Id>::deserialize(deserializer)?
        .map(String::from)
        .unwrap_or_default())
}
