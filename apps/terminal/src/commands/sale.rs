//! # Sale Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SALE 3f2a9c1e                                         2 items          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  9b1c04d2  Breakfast Tea 80s     £2.50  VAT 5%            £2.63        │
//! │  51e7aa90  P-1                   £9.99  VAT 20%          £11.99        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Subtotal £12.49   VAT £2.13   TOTAL £14.62                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Item ids are shown shortened; any unique prefix works for `remove`.

use epos_core::{Money, Product, Sale, SaleItem};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::PosSession;

const SHORT_ID: usize = 8;

fn short(id: &str) -> &str {
    id.get(..SHORT_ID).unwrap_or(id)
}

/// Adds a quantity-1 line to the sale.
///
/// With a name the line is built from a product record; without one the
/// product id doubles as the name. An unknown VAT rate id falls back to the
/// standard rate.
pub fn add_item(
    session: &PosSession,
    product_id: &str,
    price: Money,
    vat_rate_id: Option<&str>,
    name: Option<&str>,
) -> Result<String, ApiError> {
    debug!(product_id, price = %price, ?vat_rate_id, "add_item command");

    let vat_rate_id = vat_rate_id.unwrap_or(epos_core::vat::default_rate().id);
    let item = match name {
        Some(name) => SaleItem::from_product(&Product {
            id: product_id.to_string(),
            name: name.to_string(),
            price,
            vat_rate_id: vat_rate_id.to_string(),
        })?,
        None => SaleItem::new(product_id, price, vat_rate_id)?,
    };
    let line = format!(
        "Added {} {} (VAT {}) as {}",
        item.name,
        item.unit_price,
        item.vat_rate,
        short(&item.id)
    );

    let sale = session.edit(|sale| {
        sale.add_item(item)?;
        Ok(sale.clone())
    })?;

    info!(sale_id = %sale.id, items = sale.item_count(), total = %sale.total, "Item added");
    Ok(format!("{}\n{}", line, totals_line(&sale)))
}

/// Removes a line by id or unique id prefix.
pub fn remove_item(session: &PosSession, item_id: &str) -> Result<String, ApiError> {
    debug!(item_id, "remove_item command");

    let item_id = resolve_item_id(session, item_id);
    let (removed, sale) = session.edit(|sale| {
        let removed = sale.remove_item(&item_id)?;
        Ok((removed, sale.clone()))
    })?;

    info!(sale_id = %sale.id, item_id = %removed.id, total = %sale.total, "Item removed");
    Ok(format!("Removed {}\n{}", removed.name, totals_line(&sale)))
}

/// Renders the current sale.
pub fn show_sale(session: &PosSession) -> String {
    session.with_sale(format_sale)
}

/// Abandons the current sale.
pub fn cancel_sale(session: &PosSession) -> Result<String, ApiError> {
    let sale_id = session.cancel()?;
    Ok(format!("Sale {} cancelled. New sale started.", short(&sale_id)))
}

/// Expands a unique prefix to the full item id. Anything else is returned
/// unchanged, so an unknown id still fails as not found.
fn resolve_item_id(session: &PosSession, prefix: &str) -> String {
    session.with_sale(|sale| {
        let mut matches = sale.items.iter().filter(|i| i.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(item), None) => item.id.clone(),
            _ => prefix.to_string(),
        }
    })
}

fn totals_line(sale: &Sale) -> String {
    format!(
        "Subtotal {}   VAT {}   TOTAL {}",
        sale.subtotal, sale.vat_amount, sale.total
    )
}

/// Formats a sale for the operator.
pub fn format_sale(sale: &Sale) -> String {
    let mut out = format!(
        "SALE {} ({}, {} item{})\n",
        short(&sale.id),
        sale.status,
        sale.item_count(),
        if sale.item_count() == 1 { "" } else { "s" }
    );

    if sale.is_empty() {
        out.push_str("  (no items)\n");
    }
    for item in &sale.items {
        out.push_str(&format!(
            "  {:<8}  {:<20} {:>9}  VAT {:<6} {:>10}\n",
            short(&item.id),
            item.name,
            item.unit_price.to_string(),
            item.vat_rate.to_string(),
            item.gross_total().to_string()
        ));
    }
    out.push_str(&totals_line(sale));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::printer::LogPrinter;
    use epos_core::receipt::StoreDetails;
    use epos_payments::gateway::fake::FakeGateway;
    use std::sync::Arc;

    fn session() -> PosSession {
        PosSession::new(
            Arc::new(FakeGateway::new()),
            Arc::new(LogPrinter),
            StoreDetails::default(),
            42,
        )
    }

    #[test]
    fn test_add_and_show() {
        let session = session();

        let reply = add_item(&session, "P-1", Money::from_pence(999), None, None).unwrap();
        assert!(reply.contains("Added P-1 £9.99 (VAT 20%)"));
        assert!(reply.ends_with("TOTAL £11.99"));

        add_item(
            &session,
            "TEA",
            Money::from_pence(250),
            Some("reduced"),
            Some("Breakfast Tea"),
        )
        .unwrap();

        let shown = show_sale(&session);
        assert!(shown.contains("2 items"));
        assert!(shown.contains("Breakfast Tea"));
        assert!(shown.contains("VAT 5%"));
    }

    #[test]
    fn test_remove_by_prefix() {
        let session = session();
        add_item(&session, "P-1", Money::from_pence(999), None, None).unwrap();
        let item_id = session.snapshot().items[0].id.clone();

        let reply = remove_item(&session, &item_id[..6]).unwrap();
        assert!(reply.starts_with("Removed P-1"));
        assert!(session.snapshot().is_empty());

        let err = remove_item(&session, "nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let session = session();
        let err = add_item(&session, "P-1", Money::from_pence(100), None, Some("  ")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn test_price_over_cap_rejected() {
        let session = session();
        let price = crate::commands::parse_amount("90000000000000000").unwrap();

        let err = add_item(&session, "P-1", price, None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn test_cancel() {
        let session = session();
        add_item(&session, "P-1", Money::from_pence(999), None, None).unwrap();

        let reply = cancel_sale(&session).unwrap();
        assert!(reply.contains("cancelled"));
        assert!(session.snapshot().is_empty());
    }
}
