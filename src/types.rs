//! Identifiers, sentinels and compile-time limits shared across the data plane.

pub type TickerId = u32;
pub type ClientId = u32;
pub type OrderId = u64;
pub type Price = u64;
pub type Quantity = u32;
pub type Priority = u64;

pub const TICKER_ID_INVALID: TickerId = TickerId::MAX;
pub const CLIENT_ID_INVALID: ClientId = ClientId::MAX;
pub const ORDER_ID_INVALID: OrderId = OrderId::MAX;
pub const PRICE_INVALID: Price = Price::MAX;
pub const QUANTITY_INVALID: Quantity = Quantity::MAX;
pub const PRIORITY_INVALID: Priority = Priority::MAX;

/// Non-owning index into an arena. `u32::MAX` is the null sentinel.
pub type PoolIndex = u32;
pub const POOL_INDEX_INVALID: PoolIndex = PoolIndex::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
    Invalid,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Invalid => Side::Invalid,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Side::Invalid => 0,
            Side::Buy => 1,
            Side::Sell => 2,
        }
    }

    pub fn from_wire(v: u8) -> Side {
        match v {
            1 => Side::Buy,
            2 => Side::Sell,
            _ => Side::Invalid,
        }
    }
}

/// Compile-time limits (spec §3). Kept small enough for demos and tests;
/// production deployments size these to worst-case burst per §7.
pub const MAX_TICKERS: usize = 8;
pub const MAX_CLIENTS: usize = 256;
pub const MAX_ORDER_IDS: usize = 1 << 20;
pub const MAX_PRICE_LEVELS: usize = 1024;
pub const MAX_PENDING_REQUESTS: usize = 1024;

pub const LOG_QUEUE_DEPTH: usize = 1 << 23;
pub const MD_QUEUE_DEPTH: usize = 1 << 20;
pub const CLIENT_QUEUE_DEPTH: usize = 1 << 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketUpdateType {
    Invalid = 0,
    Clear = 1,
    Add = 2,
    Modify = 3,
    Cancel = 4,
    Trade = 5,
    SnapshotStart = 6,
    SnapshotEnd = 7,
}

impl MarketUpdateType {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(v: u8) -> MarketUpdateType {
        match v {
            1 => MarketUpdateType::Clear,
            2 => MarketUpdateType::Add,
            3 => MarketUpdateType::Modify,
            4 => MarketUpdateType::Cancel,
            5 => MarketUpdateType::Trade,
            6 => MarketUpdateType::SnapshotStart,
            7 => MarketUpdateType::SnapshotEnd,
            _ => MarketUpdateType::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequestType {
    Invalid = 0,
    New = 1,
    Cancel = 2,
}

impl ClientRequestType {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(v: u8) -> ClientRequestType {
        match v {
            1 => ClientRequestType::New,
            2 => ClientRequestType::Cancel,
            _ => ClientRequestType::Invalid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientResponseType {
    Invalid = 0,
    Accepted = 1,
    Cancelled = 2,
    Filled = 3,
    CancelRejected = 4,
}

impl ClientResponseType {
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(v: u8) -> ClientResponseType {
        match v {
            1 => ClientResponseType::Accepted,
            2 => ClientResponseType::Cancelled,
            3 => ClientResponseType::Filled,
            4 => ClientResponseType::CancelRejected,
            _ => ClientResponseType::Invalid,
        }
    }
}

/// A client request after FIFO sequencing, carrying the kernel receive time
/// used to linearise arrivals across clients (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct ClientRequest {
    pub kind: ClientRequestType,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl Default for ClientRequest {
    fn default() -> Self {
        ClientRequest {
            kind: ClientRequestType::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            quantity: QUANTITY_INVALID,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientResponse {
    pub kind: ClientResponseType,
    pub client_id: ClientId,
    pub ticker_id: TickerId,
    pub client_order_id: OrderId,
    pub market_order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub exec_quantity: Quantity,
    pub leaves_quantity: Quantity,
}

impl Default for ClientResponse {
    fn default() -> Self {
        ClientResponse {
            kind: ClientResponseType::Invalid,
            client_id: CLIENT_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            client_order_id: ORDER_ID_INVALID,
            market_order_id: ORDER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            exec_quantity: QUANTITY_INVALID,
            leaves_quantity: QUANTITY_INVALID,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarketUpdate {
    pub kind: MarketUpdateType,
    pub order_id: OrderId,
    pub ticker_id: TickerId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub priority: Priority,
}

impl MarketUpdate {
    pub fn invalid() -> Self {
        MarketUpdate {
            kind: MarketUpdateType::Invalid,
            order_id: ORDER_ID_INVALID,
            ticker_id: TICKER_ID_INVALID,
            side: Side::Invalid,
            price: PRICE_INVALID,
            quantity: QUANTITY_INVALID,
            priority: PRIORITY_INVALID,
        }
    }
}

impl Default for MarketUpdate {
    fn default() -> Self {
        MarketUpdate::invalid()
    }
}
