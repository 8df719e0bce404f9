use super::wire::{PositionsFrame, WsPosition};
use super::{Position, PositionUpdate};

impl From<WsPosition> for Position {
    fn from(p: WsPosition) -> Self {
        Self {
            symbol: p.symbol,
            product_id: p.product_id,
            size: p.size,
            entry_price: p.entry_price,
            margin: p.margin,
            liquidation_price: p.liquidation_price,
            bankruptcy_price: p.bankruptcy_price,
            realized_pnl: p.realized_pnl,
            realized_funding: p.realized_funding,
            timestamp: p.timestamp,
        }
    }
}

impl From<PositionsFrame> for PositionUpdate {
    fn from(frame: PositionsFrame) -> Self {
        match frame {
            PositionsFrame::Snapshot(snapshot) => PositionUpdate::Snapshot(
                snapshot
                    .result
                    .into_iter()
                    .map(Position::from)
                    .filter(|p| !p.is_flat())
                    .collect(),
            ),
            PositionsFrame::Single(wire) => {
                let deleted = wire
                    .action
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case("delete"));
                let position = Position::from(wire);
                if deleted || position.is_flat() {
                    PositionUpdate::Remove(position)
                } else {
                    PositionUpdate::Upsert(position)
                }
            }
        }
    }
}
