//! Resolution of raw user input to a single CRM order.
//!
//! The branch is decided once, on input shape: anything with enough digits
//! is handled as a phone number, everything else as an opaque access code.
//! There is no fallback from one branch to the other within a call - a
//! phone-shaped string that matches nothing stays a failed phone lookup.

use thiserror::Error;

use parcelbot_core::{phone, sort_newest_first, Order};
use parcelbot_crm::{GatewayError, OrderSystem};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Input was phone-shaped but failed normalization; the caller should
    /// prompt the user to re-enter the number.
    #[error("phone number failed validation")]
    InvalidPhone,
    #[error(transparent)]
    Crm(#[from] GatewayError),
}

/// Resolves `input` to at most one order.
pub async fn resolve<C>(crm: &C, input: &str) -> Result<Option<Order>, ResolveError>
where
    C: OrderSystem + ?Sized,
{
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if phone::looks_like_phone(trimmed) {
        let canonical = phone::normalize(trimmed).ok_or(ResolveError::InvalidPhone)?;
        resolve_by_phone(crm, &canonical).await
    } else {
        resolve_by_code(crm, trimmed).await
    }
}

/// Code branch: the code is assumed specific enough that the newest
/// matching order can be trusted without further disambiguation.
async fn resolve_by_code<C>(crm: &C, code: &str) -> Result<Option<Order>, ResolveError>
where
    C: OrderSystem + ?Sized,
{
    let mut orders = crm.find_orders_by_code(code).await?;
    sort_newest_first(&mut orders);
    Ok(orders.into_iter().next())
}

/// Phone branch: the top-ranked customer for the phone is authoritative,
/// and only orders actually embedding that customer's id are eligible -
/// stale embedded references disqualify an order rather than being
/// guessed around.
async fn resolve_by_phone<C>(crm: &C, canonical: &str) -> Result<Option<Order>, ResolveError>
where
    C: OrderSystem + ?Sized,
{
    let customers = crm.find_customers_by_phone(canonical).await?;
    let Some(customer) = customers.into_iter().next() else {
        return Ok(None);
    };

    let mut orders = crm.find_orders_by_customer(customer.id).await?;
    sort_newest_first(&mut orders);
    Ok(orders.into_iter().find(|order| {
        order.customer.as_ref().and_then(|embedded| embedded.id) == Some(customer.id)
    }))
}
