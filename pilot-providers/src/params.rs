use ethers_providers::JsonRpcClient;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Request params held as JSON while a request is being inspected.
///
/// Requests without params must reach the transport as a zero sized type, otherwise the
/// transport serializes an explicit `null`.
#[derive(Clone, Debug)]
pub(crate) enum Params {
    Value(Value),
    Zst,
}

impl Params {
    pub(crate) fn new<T: Serialize>(params: T) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::to_value(params)? {
            Value::Null => Params::Zst,
            value => Params::Value(value),
        })
    }

    /// The first positional param
    pub(crate) fn first(&self) -> Option<&Value> {
        match self {
            Params::Value(Value::Array(params)) => params.first(),
            _ => None,
        }
    }

    pub(crate) fn first_mut(&mut self) -> Option<&mut Value> {
        match self {
            Params::Value(Value::Array(params)) => params.first_mut(),
            _ => None,
        }
    }

    pub(crate) async fn forward<C, R>(self, client: &C, method: &str) -> Result<R, C::Error>
    where
        C: JsonRpcClient,
        R: DeserializeOwned + Send,
    {
        match self {
            Params::Value(params) => client.request(method, params).await,
            Params::Zst => client.request(method, ()).await,
        }
    }
}
