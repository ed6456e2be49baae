//! # Carts and Baskets
//!
//! The station's in-memory model: carts holding baskets, each basket wired
//! to one light module.
//!
//! ## Assignment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CartContainer::assign_item                           │
//! │                                                                         │
//! │  for cart in configured order:                                         │
//! │     │                                                                   │
//! │     ├── basket holds barcode and not full? ──► ExistingItem (qty + 1)  │
//! │     │                                                                   │
//! │     ├── empty basket?  ──────────────────────► NewItem (qty = 1,       │
//! │     │                                                  max = limit)    │
//! │     └── otherwise ───────────────────────────► Full, try next cart     │
//! │                                                                         │
//! │  every cart Full ────────────────────────────► Rejected                │
//! │                                                                         │
//! │  rollback(result) undoes one ExistingItem / NewItem placement          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Basket Invariants
//! - `current_quantity <= max_quantity`
//! - `barcode` is set iff `current_quantity > 0`
//! - An empty basket has `max_quantity == 0`

use std::collections::HashSet;
use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::protocol::quantity_display;
use crate::types::ModuleAddress;
use crate::validation::{validate_identifier, validate_max_quantity};

// =============================================================================
// Basket
// =============================================================================

/// One basket on a cart, lit by the module at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    id: String,
    address: ModuleAddress,
    max_quantity: u32,
    current_quantity: u32,
    barcode: Option<String>,
}

impl Basket {
    /// Creates an empty basket.
    pub fn new(id: impl Into<String>, address: ModuleAddress) -> Self {
        Basket {
            id: id.into(),
            address,
            max_quantity: 0,
            current_quantity: 0,
            barcode: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> ModuleAddress {
        self.address
    }

    pub fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    pub fn current_quantity(&self) -> u32 {
        self.current_quantity
    }

    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    /// True when no barcode is assigned.
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none()
    }

    /// True when the basket reached its capacity.
    pub fn is_full(&self) -> bool {
        !self.is_empty() && self.current_quantity >= self.max_quantity
    }

    /// True when the basket holds `barcode`.
    pub fn holds(&self, barcode: &str) -> bool {
        self.barcode.as_deref() == Some(barcode)
    }

    /// Takes one more unit of `barcode`; returns false if it cannot.
    fn try_increment(&mut self, barcode: &str) -> bool {
        if !self.holds(barcode) || self.is_full() {
            return false;
        }
        self.current_quantity += 1;
        true
    }

    /// Assigns `barcode` to this empty basket with one unit in it.
    fn place_new(&mut self, barcode: &str, max_quantity: u32) {
        self.barcode = Some(barcode.to_string());
        self.max_quantity = max_quantity;
        self.current_quantity = 1;
    }

    /// Removes one unit of `barcode`. Clears the basket at zero.
    ///
    /// Returns false (and changes nothing) when the basket does not hold
    /// `barcode`.
    pub fn remove_one(&mut self, barcode: &str) -> bool {
        if !self.holds(barcode) {
            return false;
        }
        self.current_quantity = self.current_quantity.saturating_sub(1);
        if self.current_quantity == 0 {
            self.reset();
        }
        true
    }

    /// Empties the basket.
    pub fn reset(&mut self) {
        self.barcode = None;
        self.max_quantity = 0;
        self.current_quantity = 0;
    }
}

// =============================================================================
// Placement & Assignment Result
// =============================================================================

/// Snapshot of a basket right after an item was placed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub cart_id: String,
    pub basket_id: String,
    pub address: ModuleAddress,
    pub barcode: String,
    /// Quantity after the placement.
    pub quantity: u32,
    pub max_quantity: u32,
}

impl Placement {
    fn capture(cart_id: &str, basket: &Basket, barcode: &str) -> Self {
        Placement {
            cart_id: cart_id.to_string(),
            basket_id: basket.id.clone(),
            address: basket.address,
            barcode: barcode.to_string(),
            quantity: basket.current_quantity,
            max_quantity: basket.max_quantity,
        }
    }

    /// Display text for the target module, e.g. `"  2/3"`.
    pub fn display_text(&self) -> String {
        quantity_display(self.quantity, self.max_quantity)
    }
}

/// Outcome of trying to place one scanned item.
///
/// `Full` and `Rejected` are normal outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentResult {
    /// Added to a basket already holding the barcode.
    ExistingItem(Placement),
    /// Placed in a previously empty basket.
    NewItem(Placement),
    /// This cart cannot take the item.
    Full(String),
    /// No cart can take the item, or it was refused outright.
    Rejected(String),
}

impl AssignmentResult {
    /// True for `ExistingItem` and `NewItem`.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            AssignmentResult::ExistingItem(_) | AssignmentResult::NewItem(_)
        )
    }

    pub fn placement(&self) -> Option<&Placement> {
        match self {
            AssignmentResult::ExistingItem(p) | AssignmentResult::NewItem(p) => Some(p),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AssignmentResult::Full(r) | AssignmentResult::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AssignmentResult::ExistingItem(_) => "existing_item",
            AssignmentResult::NewItem(_) => "new_item",
            AssignmentResult::Full(_) => "full",
            AssignmentResult::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for AssignmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.placement() {
            Some(p) => write!(
                f,
                "{}: cart {} basket {} ({}/{})",
                self.kind(),
                p.cart_id,
                p.basket_id,
                p.quantity,
                p.max_quantity
            ),
            None => write!(f, "{}: {}", self.kind(), self.reason().unwrap_or_default()),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A cart with its baskets in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: String,
    baskets: Vec<Basket>,
}

impl Cart {
    pub fn new(id: impl Into<String>, baskets: Vec<Basket>) -> Self {
        Cart {
            id: id.into(),
            baskets,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn baskets(&self) -> &[Basket] {
        &self.baskets
    }

    pub fn basket(&self, basket_id: &str) -> Option<&Basket> {
        self.baskets.iter().find(|b| b.id == basket_id)
    }

    /// Baskets currently holding a barcode.
    pub fn occupied(&self) -> impl Iterator<Item = &Basket> {
        self.baskets.iter().filter(|b| !b.is_empty())
    }

    /// Places one unit of `barcode` in this cart.
    ///
    /// A basket already holding the barcode wins over an empty one.
    /// `max_quantity_if_new` only applies when an empty basket is used, and
    /// an out-of-range value rejects the item instead of claiming the basket.
    pub fn try_add_item(&mut self, barcode: &str, max_quantity_if_new: u32) -> AssignmentResult {
        if let Some(basket) = self
            .baskets
            .iter_mut()
            .find(|b| b.holds(barcode) && !b.is_full())
        {
            basket.try_increment(barcode);
            return AssignmentResult::ExistingItem(Placement::capture(&self.id, basket, barcode));
        }

        if let Some(basket) = self.baskets.iter_mut().find(|b| b.is_empty()) {
            if let Err(e) = validate_max_quantity(max_quantity_if_new) {
                return AssignmentResult::Rejected(format!("barcode {}: {}", barcode, e));
            }
            basket.place_new(barcode, max_quantity_if_new);
            return AssignmentResult::NewItem(Placement::capture(&self.id, basket, barcode));
        }

        AssignmentResult::Full(format!("cart {} has no room for {}", self.id, barcode))
    }

    /// Removes one unit of `barcode` from `basket_id`.
    pub fn remove_item(&mut self, basket_id: &str, barcode: &str) -> bool {
        self.baskets
            .iter_mut()
            .find(|b| b.id == basket_id)
            .map(|b| b.remove_one(barcode))
            .unwrap_or(false)
    }

    /// Empties every basket.
    pub fn reset(&mut self) {
        for basket in &mut self.baskets {
            basket.reset();
        }
    }
}

// =============================================================================
// Cart Container
// =============================================================================

/// Every cart at the station. All mutations enter here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartContainer {
    carts: Vec<Cart>,
}

impl CartContainer {
    /// Builds the container, checking the layout.
    ///
    /// ## Rules
    /// - At least one cart, each with at least one basket
    /// - Cart ids unique; basket ids unique within a cart
    /// - Module addresses unique across the whole station
    pub fn new(carts: Vec<Cart>) -> CoreResult<Self> {
        if carts.is_empty() {
            return Err(CoreError::InvalidLayout("no carts configured".to_string()));
        }

        let mut cart_ids = HashSet::new();
        let mut addresses = HashSet::new();

        for cart in &carts {
            validate_identifier("cart id", &cart.id)?;
            if !cart_ids.insert(cart.id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "cart id".to_string(),
                    value: cart.id.clone(),
                }
                .into());
            }

            if cart.baskets.is_empty() {
                return Err(CoreError::InvalidLayout(format!(
                    "cart {} has no baskets",
                    cart.id
                )));
            }

            let mut basket_ids = HashSet::new();
            for basket in &cart.baskets {
                validate_identifier("basket id", &basket.id)?;
                if !basket_ids.insert(basket.id.as_str()) {
                    return Err(ValidationError::Duplicate {
                        field: format!("basket id in cart {}", cart.id),
                        value: basket.id.clone(),
                    }
                    .into());
                }
                if !addresses.insert(basket.address) {
                    return Err(ValidationError::Duplicate {
                        field: "module address".to_string(),
                        value: basket.address.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(CartContainer { carts })
    }

    pub fn carts(&self) -> &[Cart] {
        &self.carts
    }

    /// Finds a basket by cart and basket id.
    pub fn basket(&self, cart_id: &str, basket_id: &str) -> Option<&Basket> {
        self.carts
            .iter()
            .find(|c| c.id == cart_id)
            .and_then(|c| c.basket(basket_id))
    }

    /// Places one unit of `barcode` in the first cart that takes it.
    pub fn assign_item(&mut self, barcode: &str, max_quantity: u32) -> AssignmentResult {
        if let Err(e) = validate_max_quantity(max_quantity) {
            return AssignmentResult::Rejected(format!("barcode {}: {}", barcode, e));
        }

        for cart in &mut self.carts {
            match cart.try_add_item(barcode, max_quantity) {
                AssignmentResult::Full(_) => continue,
                result => return result,
            }
        }

        AssignmentResult::Rejected(format!("no cart has room for barcode {}", barcode))
    }

    /// Removes one unit of `barcode` from the given basket.
    pub fn remove(&mut self, cart_id: &str, basket_id: &str, barcode: &str) -> bool {
        self.carts
            .iter_mut()
            .find(|c| c.id == cart_id)
            .map(|c| c.remove_item(basket_id, barcode))
            .unwrap_or(false)
    }

    /// Undoes a successful assignment. No-op for `Full` / `Rejected`.
    pub fn rollback(&mut self, result: &AssignmentResult) -> bool {
        match result.placement() {
            Some(p) => self.remove(&p.cart_id, &p.basket_id, &p.barcode),
            None => false,
        }
    }

    /// Empties every basket on every cart.
    pub fn reset_all(&mut self) {
        for cart in &mut self.carts {
            cart.reset();
        }
    }

    /// Every module address in configured order.
    pub fn all_addresses(&self) -> Vec<ModuleAddress> {
        self.carts
            .iter()
            .flat_map(|c| c.baskets.iter().map(|b| b.address))
            .collect()
    }

    /// Finds which cart and basket a module address belongs to.
    pub fn locate(&self, address: ModuleAddress) -> Option<(&Cart, &Basket)> {
        self.carts.iter().find_map(|c| {
            c.baskets
                .iter()
                .find(|b| b.address == address)
                .map(|b| (c, b))
        })
    }

    /// Number of baskets holding a barcode.
    pub fn occupancy(&self) -> usize {
        self.carts.iter().map(|c| c.occupied().count()).sum()
    }

    /// Total number of baskets.
    pub fn basket_count(&self) -> usize {
        self.carts.iter().map(|c| c.baskets.len()).sum()
    }
}

impl fmt::Display for CartContainer {
    /// Status table, one line per basket.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} baskets occupied",
            self.occupancy(),
            self.basket_count()
        )?;
        for cart in &self.carts {
            for basket in &cart.baskets {
                match basket.barcode() {
                    Some(barcode) => writeln!(
                        f,
                        "  cart {:<6} basket {:<6} [{}] {:<20} {}/{}",
                        cart.id,
                        basket.id,
                        basket.address,
                        barcode,
                        basket.current_quantity,
                        basket.max_quantity
                    )?,
                    None => writeln!(
                        f,
                        "  cart {:<6} basket {:<6} [{}] (empty)",
                        cart.id, basket.id, basket.address
                    )?,
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
