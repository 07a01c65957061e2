mod booking;
mod payment;
mod ticket;
mod user;

pub use booking::BookingEventHandler;
pub use payment::PaymentEventHandler;
pub use ticket::TicketEventHandler;
pub use user::UserEventHandler;

use futures::FutureExt;
use std::sync::Arc;

use crate::events::dispatcher::{EventDispatcher, EventHandlerFn};
use crate::events::topics;
use crate::AppState;

/// Build every per-topic handler from the shared state and register them.
/// Called once at startup, before the dispatcher starts polling.
pub fn register_all(dispatcher: &mut EventDispatcher, state: &AppState) {
    let user = UserEventHandler::from_state(state);
    dispatcher.register_handler(
        topics::USER_EVENTS,
        Arc::new(move |message: serde_json::Value| {
            let handler = user.clone();
            async move { handler.handle(message).await }.boxed()
        }) as EventHandlerFn,
    );

    let booking = BookingEventHandler::from_state(state);
    dispatcher.register_handler(
        topics::BOOKING_EVENTS,
        Arc::new(move |message: serde_json::Value| {
            let handler = booking.clone();
            async move { handler.handle(message).await }.boxed()
        }) as EventHandlerFn,
    );

    let payment = PaymentEventHandler::from_state(state);
    dispatcher.register_handler(
        topics::PAYMENT_EVENTS,
        Arc::new(move |message: serde_json::Value| {
            let handler = payment.clone();
            async move { handler.handle(message).await }.boxed()
        }) as EventHandlerFn,
    );

    let ticket = TicketEventHandler::from_state(state);
    dispatcher.register_handler(
        topics::TICKET_EVENTS,
        Arc::new(move |message: serde_json::Value| {
            let handler = ticket.clone();
            async move { handler.handle(message).await }.boxed()
        }) as EventHandlerFn,
    );
}
