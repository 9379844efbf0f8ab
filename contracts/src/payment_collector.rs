//! # Payment Collector
//!
//! Pulls the announcement fee from a payer's fee-token balance into the
//! configured recipient. Two ways to authorize the pull:
//!
//! - **Allowance**: the payer approved the contract beforehand.
//! - **Permit**: the payer signed an allowance off-line. If the permit
//!   cannot be applied (expired, already used, or front-run by someone who
//!   submitted it first) the collector falls back to whatever allowance is
//!   already standing, so a front-run permit does not grief the payer.
//!
//! The fee amount is read from the governor on every call. Nothing here
//! checks the pause window; callers run [`FeeGovernor::refresh_pause`] first.

use thiserror::Error;
use tracing::{debug, warn};

use veil_protocol::identity::Address;
use veil_protocol::token::PermitAuthorization;

use crate::events::Event;
use crate::fee_governor::FeeGovernor;
use crate::runtime::Runtime;

/// Errors raised while pulling a fee.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionError {
    /// The token refused the transfer (balance or allowance too low).
    #[error("fee transfer failed: {0}")]
    TransferFailed(String),

    /// The governor points at a token the runtime does not host.
    #[error("fee token {0} is not deployed")]
    FeeTokenMissing(Address),
}

/// How the payer authorizes the fee pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMethod {
    /// Use the allowance already granted to the contract.
    Allowance,
    /// Apply this permit first, falling back to the standing allowance.
    Permit(PermitAuthorization),
}

/// Charges `payer` the fee the governor currently prescribes.
///
/// `spender` is the contract pulling the fee. Returns the amount collected,
/// zero when fees are paused, disabled, or the payer is exempt.
pub fn collect(
    rt: &mut Runtime,
    governor: &FeeGovernor,
    spender: Address,
    payer: Address,
    method: CollectionMethod,
) -> Result<u128, CollectionError> {
    if !governor.fees_active(rt.now()) {
        return Ok(0);
    }
    let fee = governor.effective_fee(&payer);
    if fee == 0 {
        return Ok(0);
    }

    let token_address = governor.fee_token();
    let recipient = governor.fee_recipient();
    let now = rt.now();
    let token = rt
        .token_mut(&token_address)
        .map_err(|_| CollectionError::FeeTokenMissing(token_address))?;

    if let CollectionMethod::Permit(authorization) = method {
        if let Err(err) = token.permit(now, &payer, &spender, &authorization) {
            let allowed = token.allowance(&payer, &spender);
            if allowed < fee {
                warn!(payer = %payer, error = %err, allowed, fee, "permit rejected and allowance too low");
                return Err(CollectionError::TransferFailed(format!(
                    "permit rejected ({err}) and allowance {allowed} is below fee {fee}"
                )));
            }
            debug!(payer = %payer, error = %err, "permit rejected, using standing allowance");
        }
    }

    // Logged ahead of the pull; callers run inside `Runtime::atomically`,
    // so a failed transfer drops the entry again.
    rt.emit(
        spender,
        Event::FeeCollected {
            payer,
            recipient,
            amount: fee,
        },
    );
    rt.token_mut(&token_address)
        .map_err(|_| CollectionError::FeeTokenMissing(token_address))?
        .transfer_from(&spender, &payer, &recipient, fee)
        .map_err(|err| CollectionError::TransferFailed(err.to_string()))?;

    debug!(payer = %payer, recipient = %recipient, fee, "fee collected");
    Ok(fee)
}
