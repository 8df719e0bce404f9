use super::wire::{OrdersFrame, WsOrder};
use super::{Order, OrderUpdate};

impl From<WsOrder> for Order {
    fn from(o: WsOrder) -> Self {
        Self {
            unfilled_size: o.unfilled_size.unwrap_or(o.size),
            id: o.id,
            client_order_id: o.client_order_id,
            symbol: o.symbol,
            product_id: o.product_id,
            side: o.side,
            order_type: o.order_type,
            size: o.size,
            limit_price: o.limit_price,
            stop_price: o.stop_price,
            average_fill_price: o.average_fill_price,
            state: o.state,
            created_at: o.created_at,
            timestamp: o.timestamp,
        }
    }
}

impl From<OrdersFrame> for OrderUpdate {
    fn from(frame: OrdersFrame) -> Self {
        match frame {
            OrdersFrame::Snapshot(snapshot) => OrderUpdate::Snapshot(
                snapshot
                    .result
                    .into_iter()
                    .map(Order::from)
                    .filter(|o| !o.state.is_terminal())
                    .collect(),
            ),
            OrdersFrame::Single(wire) => {
                let deleted = wire
                    .action
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case("delete"));
                let order = Order::from(wire);
                if deleted || order.state.is_terminal() {
                    OrderUpdate::Remove(order)
                } else {
                    OrderUpdate::Upsert(order)
                }
            }
        }
    }
}
