//! Domain types for the Naks Yetu platform.
//!
//! Every record persisted in the document store has a strict schema here.
//! Field names serialize in camelCase, matching the documents the web client
//! already reads; unknown fields are tolerated, missing required fields are
//! not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an event
    EventId
}

uuid_id! {
    /// Unique identifier for a ticket order
    OrderId
}

uuid_id! {
    /// Unique identifier for an RSVP
    RsvpId
}

uuid_id! {
    /// Unique identifier for an audit log entry
    AuditEntryId
}

/// Identifier of a user account, issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identity-provider uid
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// The raw uid
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who placed an order or RSVP.
///
/// Stored as the buyer's uid, or the literal `"unauthenticated"` for guest
/// checkouts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Buyer {
    /// A signed-in user
    User(UserId),
    /// A guest without an account
    Unauthenticated,
}

impl Buyer {
    /// Sentinel stored for guest buyers.
    pub const UNAUTHENTICATED: &'static str = "unauthenticated";

    /// The buyer's user id, if signed in
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Unauthenticated => None,
        }
    }
}

impl From<String> for Buyer {
    fn from(raw: String) -> Self {
        if raw == Self::UNAUTHENTICATED {
            Self::Unauthenticated
        } else {
            Self::User(UserId(raw))
        }
    }
}

impl From<Buyer> for String {
    fn from(buyer: Buyer) -> Self {
        match buyer {
            Buyer::User(id) => id.0,
            Buyer::Unauthenticated => Buyer::UNAUTHENTICATED.to_string(),
        }
    }
}

impl fmt::Display for Buyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Unauthenticated => f.write_str(Self::UNAUTHENTICATED),
        }
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Amount of money in integer minor currency units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor_units(units: u64) -> Self {
        Self(units)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies by a ticket count, `None` on overflow
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(u64::from(quantity)).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Category tag of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Paid entry with ticket types
    Ticketed,
    /// Free entry
    Free,
    /// Free entry with registration
    Rsvp,
    /// Streamed event
    Online,
    /// Club night
    Nightlife,
}

impl EventCategory {
    /// Whether events of this category may carry ticket types
    #[must_use]
    pub const fn sells_tickets(self) -> bool {
        matches!(self, Self::Ticketed)
    }
}

/// Moderation status of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Submitted by an organizer, awaiting review
    Pending,
    /// Approved and publicly listed
    Live,
    /// Declined by an admin (terminal)
    Rejected,
    /// Taken down after going live (terminal)
    Archived,
}

impl EventStatus {
    /// All statuses
    pub const ALL: [Self; 4] = [Self::Pending, Self::Live, Self::Rejected, Self::Archived];

    /// The status `decision` moves this one to, or `None` when the move is
    /// not a legal edge of the moderation state machine.
    #[must_use]
    pub const fn apply(self, decision: ModerationDecision) -> Option<Self> {
        match (self, decision) {
            (Self::Pending, ModerationDecision::Approve) => Some(Self::Live),
            (Self::Pending, ModerationDecision::Reject) => Some(Self::Rejected),
            (Self::Live, ModerationDecision::TakeDown) => Some(Self::Archived),
            _ => None,
        }
    }

    /// No decision leaves a terminal status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Archived)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Live => "live",
            Self::Rejected => "rejected",
            Self::Archived => "archived",
        })
    }
}

/// Admin decision on an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationDecision {
    /// pending → live
    Approve,
    /// pending → rejected
    Reject,
    /// live → archived
    TakeDown,
}

impl ModerationDecision {
    /// All decisions
    pub const ALL: [Self; 3] = [Self::Approve, Self::Reject, Self::TakeDown];

    /// Short label used in metrics and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::TakeDown => "take_down",
        }
    }
}

impl fmt::Display for ModerationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::TakeDown => "take down",
        })
    }
}

/// Key of a ticket type, unique within its event
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketKey(String);

impl TicketKey {
    /// Create a key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional sale window; either bound may be open
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleWindow {
    /// Sales open at (inclusive)
    pub starts_at: Option<DateTime<Utc>>,
    /// Sales close at (exclusive)
    pub ends_at: Option<DateTime<Utc>>,
}

impl SaleWindow {
    /// Whether `now` falls inside the window
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|start| now >= start) && self.ends_at.is_none_or(|end| now < end)
    }
}

/// One ticket tier of an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    /// Key, unique within the event
    pub key: TicketKey,
    /// Unit price
    pub price: Money,
    /// Total quantity; `None` is unlimited
    pub quantity: Option<u32>,
    /// Tickets sold so far
    #[serde(default)]
    pub sold: u32,
    /// When the tier can be bought
    #[serde(default)]
    pub sale_window: Option<SaleWindow>,
}

impl TicketType {
    /// A tier with nothing sold yet
    #[must_use]
    pub fn new(key: impl Into<String>, price: Money, quantity: Option<u32>) -> Self {
        Self {
            key: TicketKey::new(key),
            price,
            quantity,
            sold: 0,
            sale_window: None,
        }
    }

    /// Tickets still for sale; `None` when unlimited
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.quantity.map(|quantity| quantity.saturating_sub(self.sold))
    }

    /// Whether the tier can be bought at `now`
    #[must_use]
    pub fn on_sale(&self, now: DateTime<Utc>) -> bool {
        self.sale_window.is_none_or(|window| window.contains(now))
    }
}

/// Attendee detail an RSVP form can ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendeeField {
    /// Full name (always required)
    Name,
    /// Email (always required)
    Email,
    /// Phone number
    Phone,
    /// Postal address
    Address,
    /// Company
    Company,
    /// Job title
    JobTitle,
    /// Dietary requirements (always optional)
    Dietary,
}

impl AttendeeField {
    /// Fields every RSVP must carry
    pub const ALWAYS_REQUIRED: [Self; 2] = [Self::Name, Self::Email];

    /// Fields an organizer may additionally require
    pub const CONFIGURABLE: [Self; 4] = [Self::Phone, Self::Address, Self::Company, Self::JobTitle];

    /// Name used in documents and validation messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Company => "company",
            Self::JobTitle => "jobTitle",
            Self::Dietary => "dietary",
        }
    }
}

impl fmt::Display for AttendeeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RSVP settings of an event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpConfig {
    /// Extra attendee details the organizer requires
    #[serde(default)]
    pub required_attendee_info: Vec<AttendeeField>,
    /// Maximum confirmed RSVPs; `None` is unlimited
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Accept RSVPs past capacity as waitlisted
    #[serde(default)]
    pub waitlist_enabled: bool,
    /// Confirmed RSVPs so far
    #[serde(default)]
    pub confirmed: u32,
}

impl RsvpConfig {
    /// Whether confirmed RSVPs have reached capacity
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|capacity| self.confirmed >= capacity)
    }
}

/// An event listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Category tag
    pub category: EventCategory,
    /// The one organizer who created the event
    pub organizer_id: UserId,
    /// Moderation status
    pub status: EventStatus,
    /// When the organizer submitted the event
    pub created_at: DateTime<Utc>,
    /// Ticket tiers (ticketed events only)
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    /// RSVP settings
    #[serde(default)]
    pub rsvp_config: Option<RsvpConfig>,
    /// Gallery image URLs
    #[serde(default)]
    pub gallery: Vec<String>,
    /// Sponsor names
    #[serde(default)]
    pub sponsors: Vec<String>,
    /// Refund policy shown to buyers
    #[serde(default)]
    pub refund_policy: Option<String>,
    /// Orders stay pending until the payment collaborator confirms them
    #[serde(default)]
    pub requires_payment: bool,
}

impl Event {
    /// Look up a ticket tier
    #[must_use]
    pub fn ticket_type(&self, key: &TicketKey) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| &t.key == key)
    }

    /// Look up a ticket tier for mutation
    pub fn ticket_type_mut(&mut self, key: &TicketKey) -> Option<&mut TicketType> {
        self.ticket_types.iter_mut().find(|t| &t.key == key)
    }

    /// Whether `user` organizes this event
    #[must_use]
    pub fn is_organized_by(&self, user: &UserId) -> bool {
        &self.organizer_id == user
    }

    /// First broken record invariant, if any
    #[must_use]
    pub fn invariant_violation(&self) -> Option<String> {
        if !self.ticket_types.is_empty() && !self.category.sells_tickets() {
            return Some(format!("{:?} event carries ticket types", self.category));
        }

        let mut keys = HashSet::new();
        for ticket_type in &self.ticket_types {
            if !keys.insert(&ticket_type.key) {
                return Some(format!("duplicate ticket type {}", ticket_type.key));
            }
            if let Some(quantity) = ticket_type.quantity.filter(|quantity| ticket_type.sold > *quantity) {
                return Some(format!("{} sold {} of {quantity}", ticket_type.key, ticket_type.sold));
            }
        }

        let config = self.rsvp_config.as_ref()?;
        config
            .capacity
            .filter(|capacity| config.confirmed > *capacity)
            .map(|capacity| format!("{} confirmed RSVPs over capacity {capacity}", config.confirmed))
    }
}

/// Organizer input for a new event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Category tag
    pub category: EventCategory,
    /// Ticket tiers (ticketed events only)
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    /// RSVP settings
    #[serde(default)]
    pub rsvp_config: Option<RsvpConfig>,
    /// Gallery image URLs
    #[serde(default)]
    pub gallery: Vec<String>,
    /// Sponsor names
    #[serde(default)]
    pub sponsors: Vec<String>,
    /// Refund policy
    #[serde(default)]
    pub refund_policy: Option<String>,
    /// Whether orders need payment confirmation
    #[serde(default)]
    pub requires_payment: bool,
}

impl EventDraft {
    /// A minimal draft
    #[must_use]
    pub fn new(name: impl Into<String>, category: EventCategory) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category,
            ticket_types: Vec::new(),
            rsvp_config: None,
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        }
    }

    /// Add a ticket tier
    #[must_use]
    pub fn with_ticket_type(mut self, ticket_type: TicketType) -> Self {
        self.ticket_types.push(ticket_type);
        self
    }

    /// Set the RSVP settings
    #[must_use]
    pub fn with_rsvp(mut self, config: RsvpConfig) -> Self {
        self.rsvp_config = Some(config);
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require payment confirmation for orders
    #[must_use]
    pub const fn requiring_payment(mut self) -> Self {
        self.requires_payment = true;
        self
    }
}

/// Content edit of an event. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<EventCategory>,
    /// New gallery
    pub gallery: Option<Vec<String>>,
    /// New sponsor list
    pub sponsors: Option<Vec<String>>,
    /// New refund policy
    pub refund_policy: Option<String>,
}

impl EventPatch {
    /// Names of the fields this patch would actually change on `event`
    #[must_use]
    pub fn changed_fields(&self, event: &Event) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name.as_ref().is_some_and(|v| v != &event.name) {
            changed.push("name");
        }
        if self.description.as_ref().is_some_and(|v| v != &event.description) {
            changed.push("description");
        }
        if self.category.is_some_and(|v| v != event.category) {
            changed.push("category");
        }
        if self.gallery.as_ref().is_some_and(|v| v != &event.gallery) {
            changed.push("gallery");
        }
        if self.sponsors.as_ref().is_some_and(|v| v != &event.sponsors) {
            changed.push("sponsors");
        }
        if self
            .refund_policy
            .as_ref()
            .is_some_and(|v| event.refund_policy.as_ref() != Some(v))
        {
            changed.push("refundPolicy");
        }
        changed
    }

    /// Apply every set field to `event`
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(name) = &self.name {
            event.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            event.description.clone_from(description);
        }
        if let Some(category) = self.category {
            event.category = category;
        }
        if let Some(gallery) = &self.gallery {
            event.gallery.clone_from(gallery);
        }
        if let Some(sponsors) = &self.sponsors {
            event.sponsors.clone_from(sponsors);
        }
        if let Some(policy) = &self.refund_policy {
            event.refund_policy = Some(policy.clone());
        }
    }
}

// ============================================================================
// Orders and RSVPs
// ============================================================================

/// A buyer's in-progress ticket selection: ticket key → quantity.
///
/// Zero quantities are never stored, including in selections decoded from
/// a client payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<TicketKey, u32>", into = "BTreeMap<TicketKey, u32>")]
pub struct Selection(BTreeMap<TicketKey, u32>);

impl From<BTreeMap<TicketKey, u32>> for Selection {
    fn from(mut lines: BTreeMap<TicketKey, u32>) -> Self {
        lines.retain(|_, quantity| *quantity > 0);
        Self(lines)
    }
}

impl From<Selection> for BTreeMap<TicketKey, u32> {
    fn from(selection: Selection) -> Self {
        selection.0
    }
}

impl Selection {
    /// An empty selection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity held for `key`
    #[must_use]
    pub fn quantity_of(&self, key: &TicketKey) -> u32 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Set the quantity for `key`; zero removes the entry
    pub fn set(&mut self, key: TicketKey, quantity: u32) {
        if quantity == 0 {
            self.0.remove(&key);
        } else {
            self.0.insert(key, quantity);
        }
    }

    /// Builder form of [`set`](Self::set)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, quantity: u32) -> Self {
        self.set(TicketKey::new(key), quantity);
        self
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&TicketKey, u32)> {
        self.0.iter().map(|(key, quantity)| (key, *quantity))
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total tickets across all tiers
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.0.values().map(|q| u64::from(*q)).sum()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Status of an order or RSVP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting payment confirmation
    Pending,
    /// Confirmed
    Confirmed,
    /// RSVP accepted past capacity
    Waitlisted,
}

impl OrderStatus {
    /// Label used in metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlisted",
        }
    }
}

/// One line of an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketLine {
    /// Ticket tier
    pub ticket_type: TicketKey,
    /// Tickets bought
    pub quantity: u32,
    /// Price per ticket at checkout time
    pub unit_price: Money,
}

/// A completed checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Event bought into
    pub event_id: EventId,
    /// Event name at checkout time
    pub event_name: String,
    /// Organizer of the event, for sales reporting
    pub organizer_id: UserId,
    /// Buyer
    pub buyer: Buyer,
    /// Lines bought
    pub tickets: Vec<TicketLine>,
    /// Σ quantity × unit price
    pub total_amount: Money,
    /// Payment status
    pub status: OrderStatus,
    /// Checkout time
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total tickets in the order
    #[must_use]
    pub fn ticket_count(&self) -> u64 {
        self.tickets.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// Attendee contact details submitted with an RSVP
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInfo {
    /// Full name
    pub name: Option<String>,
    /// Email
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Company
    pub company: Option<String>,
    /// Job title
    pub job_title: Option<String>,
    /// Dietary requirements
    pub dietary: Option<String>,
}

impl AttendeeInfo {
    /// Attendee with just the always-required fields
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Set one field
    #[must_use]
    pub fn with(mut self, field: AttendeeField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            AttendeeField::Name => self.name = value,
            AttendeeField::Email => self.email = value,
            AttendeeField::Phone => self.phone = value,
            AttendeeField::Address => self.address = value,
            AttendeeField::Company => self.company = value,
            AttendeeField::JobTitle => self.job_title = value,
            AttendeeField::Dietary => self.dietary = value,
        }
        self
    }

    /// Trimmed value of `field`; blank counts as missing
    #[must_use]
    pub fn get(&self, field: AttendeeField) -> Option<&str> {
        let value = match field {
            AttendeeField::Name => &self.name,
            AttendeeField::Email => &self.email,
            AttendeeField::Phone => &self.phone,
            AttendeeField::Address => &self.address,
            AttendeeField::Company => &self.company,
            AttendeeField::JobTitle => &self.job_title,
            AttendeeField::Dietary => &self.dietary,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A recorded RSVP
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    /// RSVP identifier
    pub id: RsvpId,
    /// Event
    pub event_id: EventId,
    /// Who submitted it
    pub buyer: Buyer,
    /// Attendee details
    pub attendee: AttendeeInfo,
    /// Confirmed or waitlisted
    pub status: OrderStatus,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Users
// ============================================================================

/// Platform role of a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Attendee
    User,
    /// Creates events
    Organizer,
    /// Promotes events
    Influencer,
    /// Platform staff
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Organizer => "organizer",
            Self::Influencer => "influencer",
            Self::Admin => "admin",
        })
    }
}

/// Account status of a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Normal
    Active,
    /// Temporarily blocked until `suspendedUntil`
    Suspended,
    /// Permanently blocked
    Banned,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Banned => "banned",
        })
    }
}

/// A user profile as stored by identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User identifier
    pub id: UserId,
    /// Public display name
    pub display_name: String,
    /// Contact email
    pub email: String,
    /// Platform role
    pub role: Role,
    /// Admin level; only meaningful when `role` is admin
    #[serde(default)]
    pub admin_level: u8,
    /// Account status
    pub status: AccountStatus,
    /// End of the current suspension
    #[serde(default)]
    pub suspended_until: Option<DateTime<Utc>>,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Whether the user is an admin
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin level, zero for non-admins
    #[must_use]
    pub fn effective_admin_level(&self) -> u8 {
        if self.is_admin() { self.admin_level } else { 0 }
    }

    /// Whether the account may act
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// First broken record invariant, if any
    #[must_use]
    pub fn invariant_violation(&self) -> Option<String> {
        match (self.status, self.suspended_until) {
            (AccountStatus::Suspended, None) => Some("suspended without an end date".to_string()),
            (status, Some(_)) if status != AccountStatus::Suspended => {
                Some(format!("{status} account carries a suspension end"))
            },
            _ => None,
        }
    }
}

/// The caller of an operation, as authenticated by identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// Authenticated user id
    pub user_id: UserId,
    /// Device / user-agent string, recorded in audit entries
    pub user_agent: String,
}

impl Actor {
    /// A caller with an unknown device
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            user_agent: "unknown".to_string(),
        }
    }

    /// Attach the caller's user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn transition_table_has_exactly_three_edges() {
        let legal: Vec<_> = EventStatus::ALL
            .iter()
            .flat_map(|status| {
                ModerationDecision::ALL
                    .iter()
                    .filter_map(move |decision| status.apply(*decision).map(|to| (*status, to)))
            })
            .collect();

        assert_eq!(
            legal,
            vec![
                (EventStatus::Pending, EventStatus::Live),
                (EventStatus::Pending, EventStatus::Rejected),
                (EventStatus::Live, EventStatus::Archived),
            ]
        );
    }

    #[test]
    fn buyer_round_trips_through_sentinel() {
        let guest = serde_json::to_value(Buyer::Unauthenticated).unwrap();
        assert_eq!(guest, serde_json::json!("unauthenticated"));

        let user: Buyer = serde_json::from_value(serde_json::json!("uid-7")).unwrap();
        assert_eq!(user.user_id(), Some(&UserId::new("uid-7")));
    }

    #[test]
    fn sale_window_bounds() {
        let now = Utc::now();
        let window = SaleWindow {
            starts_at: Some(now),
            ends_at: Some(now + Duration::hours(1)),
        };

        assert!(window.contains(now));
        assert!(!window.contains(now - Duration::seconds(1)));
        assert!(!window.contains(now + Duration::hours(1)));
        assert!(SaleWindow::default().contains(now));
    }

    #[test]
    fn selection_drops_zero_quantities() {
        let mut selection = Selection::new().with("vip", 2).with("regular", 1);
        selection.set(TicketKey::new("vip"), 0);

        assert_eq!(selection.quantity_of(&TicketKey::new("vip")), 0);
        assert_eq!(selection.total_quantity(), 1);
        assert_eq!(
            serde_json::to_value(&selection).unwrap(),
            serde_json::json!({ "regular": 1 })
        );
    }

    #[test]
    fn decoded_selection_drops_zero_quantities() {
        let selection: Selection =
            serde_json::from_value(serde_json::json!({ "regular": 0, "vip": 2 })).unwrap();
        assert_eq!(selection, Selection::new().with("vip", 2));

        let nothing: Selection = serde_json::from_value(serde_json::json!({ "regular": 0 })).unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn patch_reports_only_real_changes() {
        let event = Event {
            id: EventId::new(),
            name: "Gig".to_string(),
            description: "Live band".to_string(),
            category: EventCategory::Nightlife,
            organizer_id: UserId::new("org"),
            status: EventStatus::Pending,
            created_at: Utc::now(),
            ticket_types: Vec::new(),
            rsvp_config: None,
            gallery: Vec::new(),
            sponsors: Vec::new(),
            refund_policy: None,
            requires_payment: false,
        };
        let patch = EventPatch {
            name: Some("Gig".to_string()),
            description: Some("Two bands".to_string()),
            refund_policy: Some("No refunds".to_string()),
            ..EventPatch::default()
        };

        assert_eq!(patch.changed_fields(&event), vec!["description", "refundPolicy"]);
    }

    #[test]
    fn money_display_and_overflow() {
        assert_eq!(Money::from_minor_units(1250).to_string(), "12.50");
        assert_eq!(Money::from_minor_units(u64::MAX).checked_mul(2), None);
        assert_eq!(
            Money::from_minor_units(300).checked_mul(3),
            Some(Money::from_minor_units(900))
        );
    }

    #[test]
    fn event_document_uses_camel_case() {
        let ticket = TicketType::new("vip", Money::from_minor_units(500), Some(10));
        let value = serde_json::to_value(&ticket).unwrap();

        assert_eq!(value["price"], 500);
        assert_eq!(value["sold"], 0);
        assert!(value.get("saleWindow").is_some());
        assert_eq!(ticket.remaining(), Some(10));
    }
}
