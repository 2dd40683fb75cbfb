//! Packed wire structs for the three datagram/TCP-frame shapes in spec §6.
//!
//! Host byte order is not assumed (design notes explicitly call this out as
//! something a reimplementation should fix): every field is written and
//! read little-endian so the exchange and participants need not share an
//! architecture. Layout (field order and width) otherwise mirrors §6
//! exactly.

use crate::error::WireError;
use crate::types::{
    ClientId, ClientRequest, ClientRequestType, ClientResponse, ClientResponseType, MarketUpdate,
    MarketUpdateType, OrderId, Price, Priority, Quantity, Side, TickerId,
};

pub const MARKET_UPDATE_WIRE_SIZE: usize = 1 + 8 + 4 + 1 + 8 + 4 + 8; // 34
pub const MDP_MARKET_UPDATE_WIRE_SIZE: usize = 8 + MARKET_UPDATE_WIRE_SIZE; // 42
pub const CLIENT_REQUEST_WIRE_SIZE: usize = 1 + 4 + 4 + 8 + 1 + 8 + 4; // 30
pub const ORDER_MANAGEMENT_CLIENT_REQUEST_WIRE_SIZE: usize = 8 + CLIENT_REQUEST_WIRE_SIZE; // 38
pub const CLIENT_RESPONSE_WIRE_SIZE: usize = 1 + 4 + 4 + 8 + 8 + 1 + 8 + 4 + 4; // 42

fn put_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}
fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}
fn get_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}
fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn require_len(buf: &[u8], need: usize) -> Result<(), WireError> {
    if buf.len() < need {
        return Err(WireError::ShortRead {
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

/// `MDPMarketUpdate`: sequence number plus the `MatchingEngineMarketUpdate`
/// payload, as sent on both multicast channels.
pub fn encode_mdp_market_update(sequence_number: u64, update: &MarketUpdate) -> [u8; MDP_MARKET_UPDATE_WIRE_SIZE] {
    let mut buf = [0u8; MDP_MARKET_UPDATE_WIRE_SIZE];
    put_u64(&mut buf, 0, sequence_number);
    encode_market_update_into(&mut buf[8..], update);
    buf
}

fn encode_market_update_into(buf: &mut [u8], update: &MarketUpdate) {
    buf[0] = update.kind.to_wire();
    put_u64(buf, 1, update.order_id);
    put_u32(buf, 9, update.ticker_id);
    buf[13] = update.side.to_wire();
    put_u64(buf, 14, update.price);
    put_u32(buf, 22, update.quantity);
    put_u64(buf, 26, update.priority);
}

pub fn decode_mdp_market_update(buf: &[u8]) -> Result<(u64, MarketUpdate), WireError> {
    require_len(buf, MDP_MARKET_UPDATE_WIRE_SIZE)?;
    let sequence_number = get_u64(buf, 0);
    let body = &buf[8..8 + MARKET_UPDATE_WIRE_SIZE];
    let kind = MarketUpdateType::from_wire(body[0]);
    let order_id: OrderId = get_u64(body, 1);
    let ticker_id: TickerId = get_u32(body, 9);
    let side = Side::from_wire(body[13]);
    let price: Price = get_u64(body, 14);
    let quantity: Quantity = get_u32(body, 22);
    let priority: Priority = get_u64(body, 26);
    Ok((
        sequence_number,
        MarketUpdate {
            kind,
            order_id,
            ticker_id,
            side,
            price,
            quantity,
            priority,
        },
    ))
}

/// `OrderManagementClientRequest`: per-client inbound sequence number plus
/// the `MatchingEngineClientRequest` payload.
pub fn encode_order_management_client_request(
    sequence_number: u64,
    request: &ClientRequest,
) -> [u8; ORDER_MANAGEMENT_CLIENT_REQUEST_WIRE_SIZE] {
    let mut buf = [0u8; ORDER_MANAGEMENT_CLIENT_REQUEST_WIRE_SIZE];
    put_u64(&mut buf, 0, sequence_number);
    let body = &mut buf[8..];
    body[0] = request.kind.to_wire();
    put_u32(body, 1, request.client_id);
    put_u32(body, 5, request.ticker_id);
    put_u64(body, 9, request.order_id);
    body[17] = request.side.to_wire();
    put_u64(body, 18, request.price);
    put_u32(body, 26, request.quantity);
    buf
}

pub fn decode_order_management_client_request(
    buf: &[u8],
) -> Result<(u64, ClientRequest), WireError> {
    require_len(buf, ORDER_MANAGEMENT_CLIENT_REQUEST_WIRE_SIZE)?;
    let sequence_number = get_u64(buf, 0);
    let body = &buf[8..8 + CLIENT_REQUEST_WIRE_SIZE];
    let kind = ClientRequestType::from_wire(body[0]);
    let client_id: ClientId = get_u32(body, 1);
    let ticker_id: TickerId = get_u32(body, 5);
    let order_id: OrderId = get_u64(body, 9);
    let side = Side::from_wire(body[17]);
    let price: Price = get_u64(body, 18);
    let quantity: Quantity = get_u32(body, 26);
    Ok((
        sequence_number,
        ClientRequest {
            kind,
            client_id,
            ticker_id,
            order_id,
            side,
            price,
            quantity,
        },
    ))
}

/// `ClientResponse`, without the leading outbound sequence number: the
/// order gateway writes that as a separate contiguous payload (§4.6, §6).
pub fn encode_client_response(response: &ClientResponse) -> [u8; CLIENT_RESPONSE_WIRE_SIZE] {
    let mut buf = [0u8; CLIENT_RESPONSE_WIRE_SIZE];
    buf[0] = response.kind.to_wire();
    put_u32(&mut buf, 1, response.client_id);
    put_u32(&mut buf, 5, response.ticker_id);
    put_u64(&mut buf, 9, response.client_order_id);
    put_u64(&mut buf, 17, response.market_order_id);
    buf[25] = response.side.to_wire();
    put_u64(&mut buf, 26, response.price);
    put_u32(&mut buf, 34, response.exec_quantity);
    put_u32(&mut buf, 38, response.leaves_quantity);
    buf
}

pub fn decode_client_response(buf: &[u8]) -> Result<ClientResponse, WireError> {
    require_len(buf, CLIENT_RESPONSE_WIRE_SIZE)?;
    let kind = ClientResponseType::from_wire(buf[0]);
    let client_id: ClientId = get_u32(buf, 1);
    let ticker_id: TickerId = get_u32(buf, 5);
    let client_order_id: OrderId = get_u64(buf, 9);
    let market_order_id: OrderId = get_u64(buf, 17);
    let side = Side::from_wire(buf[25]);
    let price: Price = get_u64(buf, 26);
    let exec_quantity: Quantity = get_u32(buf, 34);
    let leaves_quantity: Quantity = get_u32(buf, 38);
    Ok(ClientResponse {
        kind,
        client_id,
        ticker_id,
        client_order_id,
        market_order_id,
        side,
        price,
        exec_quantity,
        leaves_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_update_round_trips() {
        let update = MarketUpdate {
            kind: MarketUpdateType::Add,
            order_id: 42,
            ticker_id: 3,
            side: Side::Buy,
            price: 10_050,
            quantity: 7,
            priority: 2,
        };
        let wire = encode_mdp_market_update(99, &update);
        let (seq, decoded) = decode_mdp_market_update(&wire).unwrap();
        assert_eq!(seq, 99);
        assert_eq!(decoded.kind, update.kind);
        assert_eq!(decoded.order_id, update.order_id);
        assert_eq!(decoded.ticker_id, update.ticker_id);
        assert_eq!(decoded.side, update.side);
        assert_eq!(decoded.price, update.price);
        assert_eq!(decoded.quantity, update.quantity);
        assert_eq!(decoded.priority, update.priority);
    }

    #[test]
    fn client_request_round_trips() {
        let request = ClientRequest {
            kind: ClientRequestType::New,
            client_id: 5,
            ticker_id: 1,
            order_id: 77,
            side: Side::Sell,
            price: 500,
            quantity: 12,
        };
        let wire = encode_order_management_client_request(1, &request);
        let (seq, decoded) = decode_order_management_client_request(&wire).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(decoded.client_id, request.client_id);
        assert_eq!(decoded.ticker_id, request.ticker_id);
        assert_eq!(decoded.order_id, request.order_id);
        assert_eq!(decoded.side, request.side);
        assert_eq!(decoded.price, request.price);
        assert_eq!(decoded.quantity, request.quantity);
    }

    #[test]
    fn client_response_round_trips() {
        let response = ClientResponse {
            kind: ClientResponseType::Filled,
            client_id: 2,
            ticker_id: 0,
            client_order_id: 9,
            market_order_id: 100,
            side: Side::Buy,
            price: 250,
            exec_quantity: 4,
            leaves_quantity: 6,
        };
        let wire = encode_client_response(&response);
        let decoded = decode_client_response(&wire).unwrap();
        assert_eq!(decoded.client_id, response.client_id);
        assert_eq!(decoded.market_order_id, response.market_order_id);
        assert_eq!(decoded.exec_quantity, response.exec_quantity);
        assert_eq!(decoded.leaves_quantity, response.leaves_quantity);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let buf = [0u8; 4];
        assert_eq!(
            decode_mdp_market_update(&buf),
            Err(WireError::ShortRead {
                need: MDP_MARKET_UPDATE_WIRE_SIZE,
                got: 4
            })
        );
    }
}
