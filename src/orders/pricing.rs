//! Product resolution and order pricing against a catalog snapshot.
//!
//! Used both for read-only drafts and inside the confirm transaction, so the
//! same rules apply at every step.

use rust_decimal::Decimal;

use super::model::{DraftLine, ItemRequest, Product};
use crate::error::OrderError;

/// Resolve a customer-supplied product name against the catalog.
///
/// Matching is case-sensitive "contains". An exact name match wins;
/// otherwise exactly one substring match is required.
pub fn resolve_product<'a>(catalog: &'a [Product], query: &str) -> Result<&'a Product, OrderError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(OrderError::ProductNotFound(String::new()));
    }

    if let Some(exact) = catalog.iter().find(|p| p.product_name == query) {
        return Ok(exact);
    }

    let matches: Vec<&Product> = catalog
        .iter()
        .filter(|p| p.product_name.contains(query))
        .collect();

    match matches.as_slice() {
        [] => Err(OrderError::ProductNotFound(query.to_string())),
        [only] => Ok(only),
        many => Err(OrderError::AmbiguousProduct {
            query: query.to_string(),
            candidates: many.iter().map(|p| p.product_name.clone()).collect(),
        }),
    }
}

/// Resolve, merge and price a list of requested items.
///
/// Requests resolving to the same product are summed into one line before
/// the stock check. Lines keep the order of first appearance.
pub fn price_items(
    catalog: &[Product],
    items: &[ItemRequest],
) -> Result<(Vec<DraftLine>, Decimal), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut merged: Vec<(&Product, i64)> = Vec::new();
    for item in items {
        let product = resolve_product(catalog, &item.product_name)?;
        if item.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product: product.product_name.clone(),
                quantity: item.quantity,
            });
        }
        match merged
            .iter_mut()
            .find(|(p, _)| p.product_id == product.product_id)
        {
            Some((_, qty)) => {
                // A sum past i64::MAX is more than any stock can hold.
                *qty = qty
                    .checked_add(item.quantity)
                    .ok_or_else(|| OrderError::InsufficientStock {
                        product: product.product_name.clone(),
                        stock: product.stock,
                        requested: i64::MAX,
                    })?;
            }
            None => merged.push((product, item.quantity)),
        }
    }

    let mut total = Decimal::ZERO;
    let mut lines = Vec::with_capacity(merged.len());
    for (product, quantity) in merged {
        if product.stock < quantity {
            return Err(OrderError::InsufficientStock {
                product: product.product_name.clone(),
                stock: product.stock,
                requested: quantity,
            });
        }
        let subtotal = product.price * Decimal::from(quantity);
        total += subtotal;
        lines.push(DraftLine {
            product_id: product.product_id,
            product_name: product.product_name.clone(),
            unit: product.unit.clone(),
            quantity,
            unit_price: product.price,
            subtotal,
        });
    }

    Ok((lines, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: i64, name: &str, price: Decimal, stock: i64) -> Product {
        Product {
            product_id: id,
            product_name: name.to_string(),
            unit: "箱".to_string(),
            price,
            stock,
            safety_stock: 0,
            supplier: None,
            specification: None,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "蘋果", dec!(500), 100),
            product(2, "香蕉", dec!(300), 80),
            product(3, "青蘋果", dec!(550), 5),
            product(4, "Milk", dec!(45), 200),
        ]
    }

    #[test]
    fn exact_match_beats_substring() {
        let catalog = catalog();
        let p = resolve_product(&catalog, "蘋果").unwrap();
        assert_eq!(p.product_id, 1);
    }

    #[test]
    fn single_substring_match_resolves() {
        let catalog = catalog();
        assert_eq!(resolve_product(&catalog, "香").unwrap().product_id, 2);
        assert_eq!(resolve_product(&catalog, "青").unwrap().product_id, 3);
    }

    #[test]
    fn several_substring_matches_are_ambiguous() {
        let catalog = catalog();
        match resolve_product(&catalog, "果") {
            Err(OrderError::AmbiguousProduct { candidates, .. }) => {
                assert_eq!(candidates, vec!["蘋果".to_string(), "青蘋果".to_string()]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        let catalog = catalog();
        assert!(resolve_product(&catalog, "Mil").is_ok());
        assert!(matches!(
            resolve_product(&catalog, "milk"),
            Err(OrderError::ProductNotFound(_))
        ));
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let catalog = catalog();
        let items = vec![ItemRequest::new("蘋果", 2), ItemRequest::new("香蕉", 3)];
        let (lines, total) = price_items(&catalog, &items).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].subtotal, dec!(1000));
        assert_eq!(lines[1].subtotal, dec!(900));
        assert_eq!(total, dec!(1900));
        let sum: Decimal = lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();
        assert_eq!(total, sum);
    }

    #[test]
    fn duplicate_lines_are_merged_before_stock_check() {
        let catalog = catalog();
        let items = vec![ItemRequest::new("青蘋果", 3), ItemRequest::new("青蘋果", 3)];
        match price_items(&catalog, &items) {
            Err(OrderError::InsufficientStock {
                stock, requested, ..
            }) => {
                assert_eq!(stock, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        let ok = vec![ItemRequest::new("香蕉", 1), ItemRequest::new("香", 2)];
        let (lines, total) = price_items(&catalog, &ok).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(total, dec!(900));
    }

    #[test]
    fn unknown_product_and_bad_quantity_fail() {
        let catalog = catalog();
        assert!(matches!(
            price_items(&catalog, &[ItemRequest::new("榴槤", 1)]),
            Err(OrderError::ProductNotFound(name)) if name == "榴槤"
        ));
        assert!(matches!(
            price_items(&catalog, &[ItemRequest::new("蘋果", 0)]),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(price_items(&catalog, &[]), Err(OrderError::EmptyOrder)));
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let catalog = catalog();
        let items = vec![ItemRequest::new("蘋果", i64::MAX), ItemRequest::new("蘋果", 1)];
        assert!(matches!(
            price_items(&catalog, &items),
            Err(OrderError::InsufficientStock { stock: 100, requested: i64::MAX, .. })
        ));
    }

    #[test]
    fn quantity_equal_to_stock_is_allowed() {
        let catalog = catalog();
        let (lines, _) = price_items(&catalog, &[ItemRequest::new("青蘋果", 5)]).unwrap();
        assert_eq!(lines[0].quantity, 5);
    }
}
