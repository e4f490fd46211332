use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages exchanged between a host and its plugin frames.
///
/// The wire format is a JSON object discriminated by `type`:
///
/// ```json
/// { "type": "request",  "id": "…", "requestType": "theme.toggle", "payload": {} }
/// { "type": "response", "id": "…", "payload": {} }
/// { "type": "response", "id": "…", "error": "boom" }
/// { "type": "event",    "eventType": "theme-changed", "payload": {}, "namespace": "theme" }
/// ```
///
/// These shapes are shared with independently-updated plugins, so field names
/// must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Request(RequestMessage),
    Response(ResponseMessage),
    Event(EventMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Correlation id echoed back by the matching response.
    pub id: String,
    /// `"<namespace>.<action>"`.
    pub request_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub payload: Option<Value>,
}

/// Answer to a [`RequestMessage`]. `error` set means failure; neither field set
/// means a void success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub event_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub payload: Option<Value>,
    /// Provenance only. Never used for routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Keeps an explicit `null` distinguishable from an absent field.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl WireMessage {
    pub fn request(
        id: impl Into<String>,
        request_type: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        WireMessage::Request(RequestMessage {
            id: id.into(),
            request_type: request_type.into(),
            payload,
        })
    }

    /// Decode a delivered message. Returns `None` for anything that is not one
    /// of the three shapes, including shapes with an empty id or type.
    pub fn from_value(data: Value) -> Option<Self> {
        let message: WireMessage = serde_json::from_value(data).ok()?;
        let well_formed = match &message {
            WireMessage::Request(r) => !r.id.is_empty() && !r.request_type.is_empty(),
            WireMessage::Response(r) => !r.id.is_empty(),
            WireMessage::Event(e) => !e.event_type.is_empty(),
        };
        well_formed.then_some(message)
    }

    pub fn to_value(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Request(_) => "request",
            WireMessage::Response(_) => "response",
            WireMessage::Event(_) => "event",
        }
    }
}

impl ResponseMessage {
    pub fn success(id: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            id: id.into(),
            payload,
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Collapse into the outcome seen by the requester.
    pub fn into_outcome(self) -> std::result::Result<Option<Value>, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.payload),
        }
    }
}

impl EventMessage {
    pub fn new(event_type: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            namespace: None,
        }
    }

    /// Tag the event with the namespace of the plugin that emitted it.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl From<RequestMessage> for WireMessage {
    fn from(m: RequestMessage) -> Self {
        WireMessage::Request(m)
    }
}

impl From<ResponseMessage> for WireMessage {
    fn from(m: ResponseMessage) -> Self {
        WireMessage::Response(m)
    }
}

impl From<EventMessage> for WireMessage {
    fn from(m: EventMessage) -> Self {
        WireMessage::Event(m)
    }
}
