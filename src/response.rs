//! Response pair returned by the CRUD functions.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::error::CrudError;
use crate::serialize::Dumped;

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    One(Dumped),
    Many(Vec<Dumped>),
    NoContent,
}

impl Body {
    /// Body as a JSON value; `NoContent` is `None`.
    pub fn to_value(&self) -> Result<Option<Value>, CrudError> {
        Ok(match self {
            Body::One(d) => Some(Value::Object(d.clone().into_dict()?)),
            Body::Many(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|d| d.clone().into_dict().map(Value::Object))
                    .collect::<Result<_, _>>()?,
            )),
            Body::NoContent => None,
        })
    }
}

/// A body and the status it goes out with.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub body: Body,
    pub status: StatusCode,
}

impl Reply {
    pub fn one(dumped: Dumped, status: StatusCode) -> Self {
        Reply {
            body: Body::One(dumped),
            status,
        }
    }

    pub fn many(items: Vec<Dumped>) -> Self {
        Reply {
            body: Body::Many(items),
            status: StatusCode::OK,
        }
    }

    pub fn no_content(status: StatusCode) -> Self {
        Reply {
            body: Body::NoContent,
            status,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            Body::One(Dumped::Text(text)) => (
                self.status,
                [(header::CONTENT_TYPE, "application/json")],
                text,
            )
                .into_response(),
            Body::One(Dumped::Dict(attrs)) => (self.status, Json(attrs)).into_response(),
            Body::Many(items) => (self.status, Json(items)).into_response(),
            Body::NoContent => self.status.into_response(),
        }
    }
}
