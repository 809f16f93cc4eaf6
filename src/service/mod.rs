//! Loader service orchestration
//!
//! A [`LoaderService`] accepts requests from any number of
//! [`LoaderClient`]s, queues them in arrival order and starts each one on its
//! [`AsyncSpawner`] without waiting for earlier ones to finish. Every request
//! goes through the same reuse cache, so identical requests share one fetch,
//! and each reply is posted to the port of the client that asked.

pub mod client;

pub use client::{Envelope, LoaderClient, ReplyPort};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::usage::{UsageTicket, UsageTracker};
use crate::cache::ReuseCache;
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::fetch::Fetcher;
use crate::progress::{ItemId, LoadingItem, ProgressNotifier};
use crate::request::{LoadReply, LoadResponse};
use crate::runtime::AsyncSpawner;

/// State shared by every in-flight request of one service
struct Pipeline<F: Fetcher> {
    fetcher: Arc<F>,
    cache: ReuseCache<F::Output>,
    usage: Arc<UsageTracker>,
}

/// A dequeued request with the bookkeeping taken for it at dequeue time
struct Admitted<T> {
    envelope: Envelope<T>,
    ticket: UsageTicket,
    tracked: Option<(ProgressNotifier, LoadingItem)>,
}

impl<F: Fetcher> Pipeline<F> {
    fn admit(
        &self,
        envelope: Envelope<F::Output>,
        progress: Option<&ProgressNotifier>,
        config: &LoaderConfig,
    ) -> Admitted<F::Output> {
        let request = &envelope.request;
        let ticket = self.usage.acquire(&request.cache_key());

        let tracked = progress.map(|progress| {
            let item = LoadingItem::new(
                ItemId::generate(),
                format!("{} {}", request.kind, request.locator),
                config.item_weight,
            );
            progress.wait_for(item.clone());
            (progress.clone(), item)
        });

        Admitted {
            envelope,
            ticket,
            tracked,
        }
    }

    async fn process(self: Arc<Self>, admitted: Admitted<F::Output>) {
        let Admitted {
            envelope,
            ticket,
            tracked,
        } = admitted;
        let request = &envelope.request;

        let fetcher = Arc::clone(&self.fetcher);
        let fetch_request = request.clone();
        let result = self
            .cache
            .reuse(ticket, move || async move {
                fetcher.fetch(&fetch_request).await
            })
            .await;

        // Failed requests are finished work too.
        if let Some((progress, item)) = tracked {
            progress.done(item);
        }

        let result = match result {
            Ok(reused) => {
                let (data, delivery) = reused.into_parts();
                Ok(LoadResponse { data, delivery })
            }
            Err(err) => Err(LoaderError::from(err)),
        };

        envelope.respond(LoadReply {
            rpc: request.rpc,
            result,
        });
    }
}

/// Queue and bookkeeping that stay with the service while requests run elsewhere
struct Dispatcher<F: Fetcher, S: AsyncSpawner> {
    config: LoaderConfig,
    spawner: S,
    pipeline: Arc<Pipeline<F>>,
    progress: Option<ProgressNotifier>,
    queue: VecDeque<Envelope<F::Output>>,
}

impl<F: Fetcher, S: AsyncSpawner> Dispatcher<F, S> {
    fn accept(&mut self, envelope: Envelope<F::Output>) {
        let request = &envelope.request;
        match request.validate(&self.config.name, self.pipeline.fetcher.kinds()) {
            Ok(()) => self.queue.push_back(envelope),
            Err(err) => {
                log::warn!("{} rejected {}: {err}", self.config.name, request.rpc);
                let rpc = request.rpc;
                envelope.respond(LoadReply {
                    rpc,
                    result: Err(err.into()),
                });
            }
        }
    }

    fn drain(&mut self, limit: Option<usize>) -> usize {
        let limit = limit.unwrap_or(usize::MAX);
        let batch_len = self.queue.len().min(limit);

        // The whole batch is counted before any of it starts.
        let (pipeline, progress) = (&self.pipeline, self.progress.as_ref());
        let batch: Vec<_> = self
            .queue
            .drain(..batch_len)
            .map(|envelope| pipeline.admit(envelope, progress, &self.config))
            .collect();

        for admitted in batch {
            let pipeline = Arc::clone(&self.pipeline);
            self.spawner.spawn(pipeline.process(admitted));
        }

        if batch_len > 0 {
            log::debug!(
                "{} started {batch_len} request(s), {} still queued",
                self.config.name,
                self.queue.len()
            );
        }
        batch_len
    }
}

/// Serves load requests through a shared reuse cache
pub struct LoaderService<F: Fetcher, S: AsyncSpawner> {
    id: Uuid,
    dispatcher: Dispatcher<F, S>,
    inbox_tx: UnboundedSender<Envelope<F::Output>>,
    inbox: UnboundedReceiver<Envelope<F::Output>>,
}

impl<F: Fetcher, S: AsyncSpawner> LoaderService<F, S> {
    pub fn new(fetcher: F, spawner: S, config: LoaderConfig) -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded();
        Self {
            id: Uuid::new_v4(),
            dispatcher: Dispatcher {
                config,
                spawner,
                pipeline: Arc::new(Pipeline {
                    fetcher: Arc::new(fetcher),
                    cache: ReuseCache::new(),
                    usage: Arc::new(UsageTracker::new()),
                }),
                progress: None,
                queue: VecDeque::new(),
            },
            inbox_tx,
            inbox,
        }
    }

    /// Report every request to a progress channel
    pub fn with_progress(mut self, progress: ProgressNotifier) -> Self {
        self.dispatcher.progress = Some(progress);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.dispatcher.config.name
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.dispatcher.config
    }

    pub fn spawner(&self) -> &S {
        &self.dispatcher.spawner
    }

    pub fn cache(&self) -> &ReuseCache<F::Output> {
        &self.dispatcher.pipeline.cache
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.dispatcher.pipeline.usage
    }

    /// Requests accepted but not started yet
    pub fn queue_len(&self) -> usize {
        self.dispatcher.queue.len()
    }

    /// Connect a new requester context
    pub fn client(&self) -> LoaderClient<F::Output> {
        LoaderClient::new(self.inbox_tx.clone())
    }

    /// Drive tick: accept everything in the inbox, then start queued requests
    ///
    /// Returns the number of requests started. Started requests complete on
    /// the spawner, in any order.
    pub fn update(&mut self) -> usize {
        while let Ok(Some(envelope)) = self.inbox.try_next() {
            self.dispatcher.accept(envelope);
        }
        let limit = self.dispatcher.config.drain_limit;
        self.dispatcher.drain(limit)
    }

    /// Serve requests until every client is dropped
    ///
    /// Unlike [`update`](Self::update) this ignores the drain limit: a request
    /// is started as soon as it arrives.
    pub async fn run(self) {
        let LoaderService {
            mut dispatcher,
            inbox_tx,
            mut inbox,
            ..
        } = self;
        // From here on only clients keep the inbox open.
        drop(inbox_tx);

        while let Some(envelope) = inbox.next().await {
            dispatcher.accept(envelope);
            while let Ok(Some(envelope)) = inbox.try_next() {
                dispatcher.accept(envelope);
            }
            dispatcher.drain(None);
        }

        log::debug!("{} stopped, all clients are gone", dispatcher.config.name);
    }
}
