use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{DonationSucceededEvent, EventHandler, EventProducer, Handler};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub donation_succeeded_producer: Vec<EventProducer<DonationSucceededEvent>>,
}

pub struct EventHandlers {
    pub on_donation_succeeded: Option<EventHandler<DonationSucceededEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_donation_succeeded = hooks.on_donation_succeeded.map(|f| EventHandler::new(buffer_size, f));
        Self { on_donation_succeeded }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_donation_succeeded {
            result.donation_succeeded_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_donation_succeeded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_donation_succeeded: Option<Handler<DonationSucceededEvent>>,
}

impl EventHooks {
    pub fn on_donation_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DonationSucceededEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_donation_succeeded = Some(Arc::new(f));
        self
    }
}
