use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, TransactionRequest,
    U256,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the avatar executes a call on behalf of a module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Operation {
    /// A regular `CALL`
    #[default]
    Call = 0,
    /// A `DELEGATECALL` executed in the avatar's context
    DelegateCall = 1,
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for Operation {
    type Error = CallError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(CallError::InvalidOperation(other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("invalid operation: {0}")]
    InvalidOperation(u8),

    /// Contract deployments and ENS targets cannot be executed by an avatar.
    #[error("transaction has no target address")]
    MissingTarget,
}

/// A call the avatar is asked to perform. This is the unit that gets recorded, translated and
/// wrapped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaTransaction {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub operation: Operation,
}

impl MetaTransaction {
    pub fn new(to: Address) -> Self {
        Self { to, ..Default::default() }
    }

    #[must_use]
    pub fn value<T: Into<U256>>(mut self, value: T) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = data.into();
        self
    }

    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Returns the 4 byte function selector, if the calldata carries one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }
}

impl TryFrom<&TransactionRequest> for MetaTransaction {
    type Error = CallError;

    fn try_from(tx: &TransactionRequest) -> Result<Self, Self::Error> {
        let to = match tx.to {
            Some(NameOrAddress::Address(addr)) => addr,
            _ => return Err(CallError::MissingTarget),
        };
        Ok(Self {
            to,
            value: tx.value.unwrap_or_default(),
            data: tx.data.clone().unwrap_or_default(),
            operation: Operation::Call,
        })
    }
}

impl TryFrom<&TypedTransaction> for MetaTransaction {
    type Error = CallError;

    fn try_from(tx: &TypedTransaction) -> Result<Self, Self::Error> {
        let to = tx.to().and_then(NameOrAddress::as_address).copied();
        Ok(Self {
            to: to.ok_or(CallError::MissingTarget)?,
            value: tx.value().copied().unwrap_or_default(),
            data: tx.data().cloned().unwrap_or_default(),
            operation: Operation::Call,
        })
    }
}

/// The transaction that actually gets submitted: `from` the initiator, `to` the module, with the
/// avatar call embedded in `data`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedCall {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl From<EncodedCall> for TransactionRequest {
    fn from(call: EncodedCall) -> Self {
        TransactionRequest::new().from(call.from).to(call.to).data(call.data).value(call.value)
    }
}
