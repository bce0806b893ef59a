use ethers_providers::JsonRpcClient;
use pilot_providers::{ForkApi, Session, SessionError};
use pilot_translations::Translations;
use tracing::debug;

/// Applies the auto-apply translations to the calls recorded in `session`.
///
/// Calls appended by the rules are sent to the fork. Anything else replays the whole recording.
/// Returns whether the recording changed.
pub async fn auto_apply<C, A>(
    session: &Session<C, A>,
    translations: &Translations,
) -> Result<bool, SessionError>
where
    C: JsonRpcClient + Clone + 'static,
    C::Error: 'static,
    A: ForkApi + 'static,
{
    let route = session.route();
    let Some(chain_id) = route.chain_id() else { return Ok(false) };
    let batch: Vec<_> = session.recorded().into_iter().map(|recorded| recorded.call).collect();
    let Some(applied) = translations.auto_apply(&batch, chain_id, route.avatar_address()) else {
        return Ok(false)
    };

    if applied.starts_with(&batch) {
        let added = applied.len() - batch.len();
        debug!(target: "pilot::translations", added, "appending calls");
        for call in &applied[batch.len()..] {
            session.send(call).await?;
        }
    } else {
        debug!(target: "pilot::translations", calls = applied.len(), "replaying calls");
        session.replay(applied).await?;
    }
    Ok(true)
}

/// Replaces the call recorded at `checkpoint` with the first applicable translation.
///
/// Returns the title of the applied translation, or `None` if no rule applies to the call.
pub async fn translate_call<C, A>(
    session: &Session<C, A>,
    translations: &Translations,
    checkpoint: &str,
) -> Result<Option<String>, SessionError>
where
    C: JsonRpcClient + Clone + 'static,
    C::Error: 'static,
    A: ForkApi + 'static,
{
    let route = session.route();
    let Some(chain_id) = route.chain_id() else { return Ok(None) };
    let recorded = session
        .recorded()
        .into_iter()
        .find(|recorded| recorded.checkpoint == checkpoint)
        .ok_or_else(|| SessionError::UnknownCheckpoint(checkpoint.to_string()))?;
    let Some(applicable) = translations.find_applicable(&recorded.call, chain_id) else {
        return Ok(None)
    };
    session.apply_translation(checkpoint, applicable.result).await?;
    Ok(Some(applicable.title))
}
