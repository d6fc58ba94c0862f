//! Matching engine.
//!
//! Pure function over one market's resting orders: no I/O, no shared state,
//! infallible on well-typed input. Produces the exact balance, position and
//! order deltas the settlement applier commits in a single transaction.
//!
//! Two match forms:
//! - **Direct**: best buy and best sell on the same outcome cross; trade at
//!   the midpoint so the surplus splits evenly.
//! - **Synthetic**: bids across distinct outcomes sum to at least 1.00, so
//!   the exchange mints complete baskets. Outcomes nobody in the set bid on
//!   are distributed pro-rata among the participants.
//!
//! Within a tied price level, counterpart quantity is allocated pro-rata
//! (floored); arrival order is only a subordinate tie-break. Each fired match
//! moves at least one contract, so the loop terminates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::types::{
    BalanceUpdate, BookOrder, MarketState, MatchResult, OrderUpdate, PositionUpdate,
};
use crate::models::{Execution, ExecutionKind, ExecutionParticipant, OrderSide};

/// Run matching to quiescence over a market snapshot.
///
/// Direct matches are attempted for every outcome before each synthetic
/// attempt; direct liquidity is strictly preferred.
pub fn execute(state: &MarketState, now: DateTime<Utc>) -> MatchResult {
    let mut work: Vec<BookOrder> = state.orders.clone();
    let mut ledger = Ledger::new(state.market_id, now);

    loop {
        let mut fired = false;
        for &outcome_id in &state.outcome_ids {
            while direct_match_once(&mut work, outcome_id, &mut ledger) {
                fired = true;
            }
        }
        if !fired {
            fired = synthetic_match_once(&mut work, &state.outcome_ids, &mut ledger);
        }
        if !fired {
            break;
        }
    }

    ledger.into_result(&state.orders, &work)
}

/// Accumulates deltas while the working book is mutated in place.
struct Ledger {
    market_id: Uuid,
    now: DateTime<Utc>,
    /// user -> (balance delta, locked delta)
    balances: BTreeMap<String, (Decimal, Decimal)>,
    /// (user, outcome) -> holdings delta
    positions: BTreeMap<(String, Uuid), Decimal>,
    executions: Vec<Execution>,
}

impl Ledger {
    fn new(market_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            market_id,
            now,
            balances: BTreeMap::new(),
            positions: BTreeMap::new(),
            executions: Vec::new(),
        }
    }

    fn credit_balance(&mut self, user_id: &str, balance_delta: Decimal, locked_delta: Decimal) {
        let entry = self.balances.entry(user_id.to_string()).or_default();
        entry.0 += balance_delta;
        entry.1 += locked_delta;
    }

    fn credit_position(&mut self, user_id: &str, outcome_id: Uuid, delta: Decimal) {
        *self
            .positions
            .entry((user_id.to_string(), outcome_id))
            .or_default() += delta;
    }

    fn record(&mut self, kind: ExecutionKind, participants: Vec<ExecutionParticipant>) {
        self.executions.push(Execution {
            id: Uuid::new_v4(),
            market_id: self.market_id,
            kind,
            executed_at: self.now,
            participants: Json(participants),
        });
    }

    fn into_result(self, original: &[BookOrder], worked: &[BookOrder]) -> MatchResult {
        let order_updates = original
            .iter()
            .zip(worked)
            .filter(|(before, after)| before.quantity != after.quantity)
            .map(|(_, after)| OrderUpdate {
                order_id: after.id,
                new_quantity: after.quantity,
                new_escrow: if after.quantity == 0 {
                    Decimal::ZERO
                } else {
                    after.escrow_amount
                },
            })
            .collect();

        let balance_updates = self
            .balances
            .into_iter()
            .filter(|(_, (balance, locked))| !balance.is_zero() || !locked.is_zero())
            .map(|(user_id, (balance_delta, locked_delta))| BalanceUpdate {
                user_id,
                balance_delta,
                locked_delta,
            })
            .collect();

        let position_updates = self
            .positions
            .into_iter()
            .filter(|(_, delta)| !delta.is_zero())
            .map(|((user_id, outcome_id), quantity_delta)| PositionUpdate {
                user_id,
                outcome_id,
                quantity_delta,
            })
            .collect();

        MatchResult {
            executions: self.executions,
            order_updates,
            position_updates,
            balance_updates,
        }
    }
}

/// Arrival order within a tied price level: oldest first, order id as the
/// final disambiguator.
fn fifo_key(order: &BookOrder) -> (DateTime<Utc>, Uuid) {
    (order.created_at, order.id)
}

/// Floor-divide `available` across `quantities` proportionally. The residual
/// units stay unfilled on the book.
fn allocate_pro_rata(quantities: &[i64], available: i64) -> Vec<i64> {
    let total: i64 = quantities.iter().sum();
    quantities
        .iter()
        .map(|&quantity| ((quantity as i128 * available as i128) / total as i128) as i64)
        .collect()
}

/// Consume `amount` across `quantities` front to back.
fn fill_in_order(quantities: &[i64], mut amount: i64) -> Vec<i64> {
    quantities
        .iter()
        .map(|&quantity| {
            let fill = quantity.min(amount);
            amount -= fill;
            fill
        })
        .collect()
}

/// Attempt one direct match on `outcome_id`. Returns false when the book
/// does not cross or pro-rata flooring cannot move a whole contract.
fn direct_match_once(work: &mut [BookOrder], outcome_id: Uuid, ledger: &mut Ledger) -> bool {
    let live = |order: &BookOrder, side: OrderSide| {
        order.outcome_id == outcome_id && order.side == side && order.quantity > 0
    };

    let best_bid = work
        .iter()
        .filter(|o| live(o, OrderSide::Buy))
        .map(|o| o.price)
        .max();
    let best_ask = work
        .iter()
        .filter(|o| live(o, OrderSide::Sell))
        .map(|o| o.price)
        .min();
    let (Some(bid), Some(ask)) = (best_bid, best_ask) else {
        return false;
    };
    if bid < ask {
        return false;
    }

    // Fair split of the crossed surplus.
    let match_price = (bid + ask) / Decimal::TWO;

    let mut buy_level: Vec<usize> = (0..work.len())
        .filter(|&i| live(&work[i], OrderSide::Buy) && work[i].price == bid)
        .collect();
    buy_level.sort_by_key(|&i| fifo_key(&work[i]));
    let mut sell_level: Vec<usize> = (0..work.len())
        .filter(|&i| live(&work[i], OrderSide::Sell) && work[i].price == ask)
        .collect();
    sell_level.sort_by_key(|&i| fifo_key(&work[i]));

    let buy_quantities: Vec<i64> = buy_level.iter().map(|&i| work[i].quantity).collect();
    let sell_quantities: Vec<i64> = sell_level.iter().map(|&i| work[i].quantity).collect();
    let total_buy: i64 = buy_quantities.iter().sum();
    let total_sell: i64 = sell_quantities.iter().sum();

    // Ration the oversubscribed side pro-rata; the other side fills in
    // arrival order for exactly the rationed total.
    let (buy_fills, sell_fills) = match total_buy.cmp(&total_sell) {
        std::cmp::Ordering::Equal => (buy_quantities.clone(), sell_quantities.clone()),
        std::cmp::Ordering::Greater => {
            let fills = allocate_pro_rata(&buy_quantities, total_sell);
            let matched: i64 = fills.iter().sum();
            let counter = fill_in_order(&sell_quantities, matched);
            (fills, counter)
        }
        std::cmp::Ordering::Less => {
            let fills = allocate_pro_rata(&sell_quantities, total_buy);
            let matched: i64 = fills.iter().sum();
            let counter = fill_in_order(&buy_quantities, matched);
            (counter, fills)
        }
    };
    let matched: i64 = buy_fills.iter().sum();
    if matched == 0 {
        return false;
    }

    let mut participants = Vec::new();

    for (&i, &fill) in buy_level.iter().zip(&buy_fills) {
        if fill == 0 {
            continue;
        }
        let order = &mut work[i];
        let fill_dec = Decimal::from(fill);
        // The bid escrow for these contracts is released in full; the match
        // cost leaves the balance.
        let released = fill_dec * order.price;
        ledger.credit_balance(&order.user_id, -(fill_dec * match_price), -released);
        ledger.credit_position(&order.user_id, outcome_id, fill_dec);
        order.quantity -= fill;
        order.escrow_amount -= released;
        participants.push(ExecutionParticipant {
            user_id: order.user_id.clone(),
            outcome_id,
            quantity: fill_dec,
            effective_price: match_price,
        });
    }

    for (&i, &fill) in sell_level.iter().zip(&sell_fills) {
        if fill == 0 {
            continue;
        }
        let order = &mut work[i];
        let fill_dec = Decimal::from(fill);
        // Proportional share of whatever escrow backs this order.
        let escrow_used = order.escrow_amount * fill_dec / Decimal::from(order.quantity);
        ledger.credit_balance(&order.user_id, fill_dec * match_price, -escrow_used);
        ledger.credit_position(&order.user_id, outcome_id, -fill_dec);
        order.quantity -= fill;
        order.escrow_amount -= escrow_used;
        participants.push(ExecutionParticipant {
            user_id: order.user_id.clone(),
            outcome_id,
            quantity: -fill_dec,
            effective_price: match_price,
        });
    }

    ledger.record(ExecutionKind::Direct, participants);
    true
}

/// Attempt one basket mint. Greedily grows the highest-bid set of distinct
/// outcomes until the bid prices reach 1.00; definitive per the design, since
/// descending order gives participants the best terms.
fn synthetic_match_once(work: &mut [BookOrder], outcome_ids: &[Uuid], ledger: &mut Ledger) -> bool {
    let mut candidates: Vec<usize> = Vec::new();
    for &outcome_id in outcome_ids {
        let best = (0..work.len())
            .filter(|&i| {
                let o = &work[i];
                o.outcome_id == outcome_id && o.side == OrderSide::Buy && o.quantity > 0
            })
            .min_by(|&a, &b| {
                work[b]
                    .price
                    .cmp(&work[a].price)
                    .then_with(|| fifo_key(&work[a]).cmp(&fifo_key(&work[b])))
            });
        if let Some(i) = best {
            candidates.push(i);
        }
    }

    candidates.sort_by(|&a, &b| {
        work[b]
            .price
            .cmp(&work[a].price)
            .then_with(|| fifo_key(&work[a]).cmp(&fifo_key(&work[b])))
    });

    let mut bid_sum = Decimal::ZERO;
    let mut set: Vec<usize> = Vec::new();
    for &i in &candidates {
        set.push(i);
        bid_sum += work[i].price;
        if bid_sum >= Decimal::ONE {
            break;
        }
    }
    if bid_sum < Decimal::ONE {
        return false;
    }

    let quantity = set
        .iter()
        .map(|&i| work[i].quantity)
        .min()
        .expect("set is non-empty once bids reach 1.00");
    let quantity_dec = Decimal::from(quantity);

    let mut participants = Vec::with_capacity(set.len());
    for &i in &set {
        let order = &mut work[i];
        let paid = quantity_dec * order.price;
        ledger.credit_balance(&order.user_id, -paid, -paid);
        ledger.credit_position(&order.user_id, order.outcome_id, quantity_dec);
        order.quantity -= quantity;
        order.escrow_amount -= paid;
        participants.push(ExecutionParticipant {
            user_id: order.user_id.clone(),
            outcome_id: order.outcome_id,
            quantity: quantity_dec,
            effective_price: order.price,
        });
    }

    // Contracts of outcomes nobody in the set wanted still get minted; they
    // go back to the participants pro-rata by bid. The last participant
    // takes the exact remainder so per-outcome totals conserve.
    let member_outcomes: Vec<Uuid> = set.iter().map(|&i| work[i].outcome_id).collect();
    for &outcome_id in outcome_ids {
        if member_outcomes.contains(&outcome_id) {
            continue;
        }
        let mut distributed = Decimal::ZERO;
        for (position, &i) in set.iter().enumerate() {
            let share = if position == set.len() - 1 {
                quantity_dec - distributed
            } else {
                quantity_dec * work[i].price / bid_sum
            };
            ledger.credit_position(&work[i].user_id, outcome_id, share);
            distributed += share;
        }
    }

    ledger.record(ExecutionKind::Synthetic, participants);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::escrow::required_escrow;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn base_time() -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn buy(user: &str, outcome: Uuid, quantity: i64, price: Decimal, seq: i64) -> BookOrder {
        BookOrder {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            outcome_id: outcome,
            side: OrderSide::Buy,
            quantity,
            price,
            escrow_amount: required_escrow(OrderSide::Buy, quantity, price, Decimal::ZERO),
            created_at: base_time() + Duration::seconds(seq),
        }
    }

    fn sell(
        user: &str,
        outcome: Uuid,
        quantity: i64,
        price: Decimal,
        owned: Decimal,
        seq: i64,
    ) -> BookOrder {
        BookOrder {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            outcome_id: outcome,
            side: OrderSide::Sell,
            quantity,
            price,
            escrow_amount: required_escrow(OrderSide::Sell, quantity, price, owned),
            created_at: base_time() + Duration::seconds(seq),
        }
    }

    fn state(outcome_ids: Vec<Uuid>, orders: Vec<BookOrder>) -> MarketState {
        MarketState {
            market_id: Uuid::new_v4(),
            outcome_ids,
            orders,
            positions: Vec::new(),
        }
    }

    fn balance_of<'a>(result: &'a MatchResult, user: &str) -> &'a BalanceUpdate {
        result
            .balance_updates
            .iter()
            .find(|u| u.user_id == user)
            .expect("balance update present")
    }

    fn position_of(result: &MatchResult, user: &str, outcome: Uuid) -> Decimal {
        result
            .position_updates
            .iter()
            .find(|u| u.user_id == user && u.outcome_id == outcome)
            .map(|u| u.quantity_delta)
            .unwrap_or(Decimal::ZERO)
    }

    /// Per-outcome totals of the produced position deltas must be equal
    /// across all outcomes (each is the number of newly minted baskets).
    fn assert_baskets_conserved(result: &MatchResult, outcome_ids: &[Uuid]) {
        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for update in &result.position_updates {
            *totals.entry(update.outcome_id).or_default() += update.quantity_delta;
        }
        let reference = totals
            .get(&outcome_ids[0])
            .copied()
            .unwrap_or(Decimal::ZERO);
        for outcome_id in outcome_ids {
            assert_eq!(
                totals.get(outcome_id).copied().unwrap_or(Decimal::ZERO),
                reference,
                "per-outcome totals diverge"
            );
        }
    }

    #[test]
    fn test_direct_fill_at_midpoint() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let orders = vec![
            buy("alice", yes, 10, dec!(0.70), 0),
            sell("bob", yes, 10, dec!(0.30), Decimal::ZERO, 1),
        ];
        let result = execute(&state(vec![yes, no], orders), base_time());

        assert_eq!(result.executions.len(), 1);
        assert_eq!(result.executions[0].kind, ExecutionKind::Direct);
        let participants = &result.executions[0].participants;
        assert!(participants
            .iter()
            .all(|p| p.effective_price == dec!(0.50)));

        let alice = balance_of(&result, "alice");
        assert_eq!(alice.balance_delta, dec!(-5.0));
        assert_eq!(alice.locked_delta, dec!(-7.0));

        let bob = balance_of(&result, "bob");
        assert_eq!(bob.balance_delta, dec!(5.0));
        assert_eq!(bob.locked_delta, dec!(-7.0));

        assert_eq!(position_of(&result, "alice", yes), dec!(10));
        assert_eq!(position_of(&result, "bob", yes), dec!(-10));

        // Both orders fully consumed, escrow fully released.
        assert_eq!(result.order_updates.len(), 2);
        for update in &result.order_updates {
            assert_eq!(update.new_quantity, 0);
            assert_eq!(update.new_escrow, Decimal::ZERO);
        }

        // Direct matches move cash between the parties only.
        let net: Decimal = result
            .balance_updates
            .iter()
            .map(|u| u.balance_delta)
            .sum();
        assert_eq!(net, Decimal::ZERO);
        assert_baskets_conserved(&result, &[yes, no]);
    }

    #[test]
    fn test_synthetic_mint_two_outcomes() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let orders = vec![
            buy("carol", yes, 10, dec!(0.60), 0),
            buy("dave", no, 10, dec!(0.55), 1),
        ];
        let result = execute(&state(vec![yes, no], orders), base_time());

        assert_eq!(result.executions.len(), 1);
        assert_eq!(result.executions[0].kind, ExecutionKind::Synthetic);

        let carol = balance_of(&result, "carol");
        assert_eq!(carol.balance_delta, dec!(-6.0));
        assert_eq!(carol.locked_delta, dec!(-6.0));
        let dave = balance_of(&result, "dave");
        assert_eq!(dave.balance_delta, dec!(-5.5));
        assert_eq!(dave.locked_delta, dec!(-5.5));

        assert_eq!(position_of(&result, "carol", yes), dec!(10));
        assert_eq!(position_of(&result, "dave", no), dec!(10));
        // No non-participating outcomes, so nothing else moved.
        assert_eq!(result.position_updates.len(), 2);

        assert_baskets_conserved(&result, &[yes, no]);
    }

    #[test]
    fn test_synthetic_mint_distributes_surplus_outcome() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let orders = vec![
            buy("buyer-a", a, 10, dec!(0.55), 0),
            buy("buyer-b", b, 10, dec!(0.50), 1),
            buy("buyer-c", c, 10, dec!(0.30), 2),
        ];
        let result = execute(&state(vec![a, b, c], orders), base_time());

        // Greedy set stops at {a, b}: 0.55 + 0.50 >= 1.00. The c bid rests.
        assert_eq!(result.executions.len(), 1);
        let participant_users: Vec<&str> = result.executions[0]
            .participants
            .iter()
            .map(|p| p.user_id.as_str())
            .collect();
        assert_eq!(participant_users, vec!["buyer-a", "buyer-b"]);
        assert!(result
            .balance_updates
            .iter()
            .all(|u| u.user_id != "buyer-c"));

        // Surplus c contracts split 0.55 : 0.50, remainder to the last
        // participant so the totals stay exact.
        let share_a = dec!(10) * dec!(0.55) / dec!(1.05);
        let share_b = dec!(10) - share_a;
        assert_eq!(position_of(&result, "buyer-a", c), share_a);
        assert_eq!(position_of(&result, "buyer-b", c), share_b);
        assert_eq!(position_of(&result, "buyer-a", a), dec!(10));
        assert_eq!(position_of(&result, "buyer-b", b), dec!(10));

        assert_baskets_conserved(&result, &[a, b, c]);
    }

    #[test]
    fn test_bids_below_one_rest() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let orders = vec![
            buy("eve", yes, 10, dec!(0.40), 0),
            buy("frank", no, 10, dec!(0.45), 1),
        ];
        let result = execute(&state(vec![yes, no], orders), base_time());

        assert!(result.is_empty());
        assert!(result.order_updates.is_empty());
        assert!(result.balance_updates.is_empty());
        assert!(result.position_updates.is_empty());
    }

    #[test]
    fn test_pro_rata_split_within_price_level() {
        let yes = Uuid::new_v4();
        let orders = vec![
            buy("u1", yes, 6, dec!(0.60), 0),
            buy("u2", yes, 4, dec!(0.60), 1),
            sell("u3", yes, 5, dec!(0.40), dec!(5), 2),
        ];
        let result = execute(&state(vec![yes], orders), base_time());

        // 5 available against 10 demanded: floor(6*5/10)=3, floor(4*5/10)=2.
        assert_eq!(position_of(&result, "u1", yes), dec!(3));
        assert_eq!(position_of(&result, "u2", yes), dec!(2));
        assert_eq!(position_of(&result, "u3", yes), dec!(-5));

        let u1 = balance_of(&result, "u1");
        assert_eq!(u1.balance_delta, dec!(-1.50));
        assert_eq!(u1.locked_delta, dec!(-1.80));
        let u3 = balance_of(&result, "u3");
        assert_eq!(u3.balance_delta, dec!(2.50));
        assert_eq!(u3.locked_delta, Decimal::ZERO);

        // Buyers keep their residual on the book.
        let remaining: HashMap<i64, i64> = result
            .order_updates
            .iter()
            .map(|u| (u.new_quantity, 1))
            .fold(HashMap::new(), |mut acc, (q, n)| {
                *acc.entry(q).or_default() += n;
                acc
            });
        assert_eq!(remaining.get(&3), Some(&1));
        assert_eq!(remaining.get(&2), Some(&1));
        assert_eq!(remaining.get(&0), Some(&1));
    }

    #[test]
    fn test_pro_rata_residual_unit_rests() {
        let yes = Uuid::new_v4();
        let orders = vec![
            buy("u1", yes, 1, dec!(0.60), 0),
            buy("u2", yes, 1, dec!(0.60), 1),
            sell("u3", yes, 1, dec!(0.40), dec!(1), 2),
        ];
        let result = execute(&state(vec![yes], orders), base_time());

        // floor(1*1/2) = 0 for both buyers: nothing can move.
        assert!(result.is_empty());
    }

    #[test]
    fn test_synthetic_best_bid_breaks_ties_by_age() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let orders = vec![
            buy("early", yes, 5, dec!(0.60), 0),
            buy("late", yes, 8, dec!(0.60), 1),
            buy("other", no, 10, dec!(0.55), 2),
        ];
        let result = execute(&state(vec![yes, no], orders), base_time());

        assert_eq!(result.executions.len(), 1);
        let users: Vec<&str> = result.executions[0]
            .participants
            .iter()
            .map(|p| p.user_id.as_str())
            .collect();
        assert!(users.contains(&"early"));
        assert!(!users.contains(&"late"));

        // Quantity capped by the older order.
        assert_eq!(position_of(&result, "early", yes), dec!(5));
        assert_eq!(position_of(&result, "other", no), dec!(5));
    }

    #[test]
    fn test_direct_preferred_then_synthetic_chains() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let orders = vec![
            buy("alice", yes, 10, dec!(0.70), 0),
            sell("bob", yes, 5, dec!(0.30), Decimal::ZERO, 1),
            buy("carol", no, 5, dec!(0.40), 2),
        ];
        let result = execute(&state(vec![yes, no], orders), base_time());

        // First the direct cross for 5, then alice's remainder mints with
        // carol: 0.70 + 0.40 >= 1.00.
        assert_eq!(result.executions.len(), 2);
        assert_eq!(result.executions[0].kind, ExecutionKind::Direct);
        assert_eq!(result.executions[1].kind, ExecutionKind::Synthetic);

        let alice = balance_of(&result, "alice");
        assert_eq!(alice.balance_delta, dec!(-6.0)); // 5*0.50 + 5*0.70
        assert_eq!(alice.locked_delta, dec!(-7.0)); // full escrow released

        assert_eq!(position_of(&result, "alice", yes), dec!(10));
        assert_eq!(position_of(&result, "bob", yes), dec!(-5));
        assert_eq!(position_of(&result, "carol", no), dec!(5));
        assert_baskets_conserved(&result, &[yes, no]);
    }

    #[test]
    fn test_partial_fill_releases_escrow_proportionally() {
        let yes = Uuid::new_v4();
        let orders = vec![
            buy("buyer", yes, 4, dec!(0.70), 0),
            sell("seller", yes, 10, dec!(0.30), Decimal::ZERO, 1),
        ];
        let result = execute(&state(vec![yes], orders), base_time());

        // Seller escrow 7.0; 4 of 10 filled releases 2.8.
        let seller = balance_of(&result, "seller");
        assert_eq!(seller.balance_delta, dec!(2.0));
        assert_eq!(seller.locked_delta, dec!(-2.8));

        let seller_update = result
            .order_updates
            .iter()
            .find(|u| u.new_quantity == 6)
            .expect("seller order partially filled");
        assert_eq!(seller_update.new_escrow, dec!(4.2));
    }

    #[test]
    fn test_market_state_validation_rejects_skewed_holdings() {
        let yes = Uuid::new_v4();
        let no = Uuid::new_v4();
        let mut holdings = HashMap::new();
        holdings.insert(yes, dec!(10));
        let snapshot = MarketState {
            market_id: Uuid::new_v4(),
            outcome_ids: vec![yes, no],
            orders: Vec::new(),
            positions: vec![crate::services::matching::MarketPosition {
                user_id: "u1".to_string(),
                holdings,
            }],
        };
        assert!(snapshot.validate().is_err());
    }
}
