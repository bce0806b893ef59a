use crate::{
    module::{AuthorizationModule, WrapError},
    route::Route,
    types::{EncodedCall, MetaTransaction, U256},
};

/// Re-encodes an avatar call so it travels through the route's authorization module.
///
/// The resulting call is sent by the initiator to the module with zero value; any value transfer
/// is part of the encoded payload. Routes where the initiator owns the avatar directly have no
/// module to wrap through and yield [`WrapError::NoModule`].
pub fn wrap(
    call: &MetaTransaction,
    route: &Route,
    revert_on_error: bool,
) -> Result<EncodedCall, WrapError> {
    let from = route.initiator_address().ok_or(WrapError::MissingInitiator)?;
    let module = AuthorizationModule::from_route(route)?;
    Ok(EncodedCall {
        from,
        to: module.address(),
        data: module.encode(call, revert_on_error),
        value: U256::zero(),
    })
}
