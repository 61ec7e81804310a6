//! Service layer API for invoice operations
//!
//! Every operation takes the acting user, checks access against the stored
//! invoice and the lifecycle rules inside the same storage transaction that
//! writes the result, then notifies the registered invalidation hooks.
//! Domain failures surface as [`InvoiceError`] inside the returned
//! `anyhow::Error`.
use crate::access::{AccessMode, Actor, Ownership, authorize, can_access};
use crate::config::InvoiceConfig;
use crate::error::InvoiceError;
use crate::hooks::{InvalidationHook, MutationEvent, MutationKind};
use crate::inventory::{Part, StockMove};
use crate::invoice::{Invoice, InvoiceDraft, InvoiceHeader};
use crate::lifecycle::InvoiceStatus;
use crate::listing::InvoiceListing;
use crate::store::{Committed, InvoiceStore, Replacement};
use crate::types::TimeStamp;
use crate::utils;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct InvoiceService {
    store: InvoiceStore,
    config: InvoiceConfig,
    hooks: Vec<Box<dyn InvalidationHook>>,
}

fn ownership(header: &InvoiceHeader) -> Ownership<'_> {
    Ownership {
        created_by_id: &header.created_by_id,
        group_id: header.group_id.as_deref(),
    }
}

impl InvoiceService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        Self::with_config(instance, InvoiceConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: InvoiceConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let store = InvoiceStore::open(instance, &config)?;

        Ok(Self {
            store,
            config,
            hooks: vec![],
        })
    }

    pub fn config(&self) -> &InvoiceConfig {
        &self.config
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.store
    }

    /// Registers a callback run after each committed mutation.
    pub fn subscribe(&mut self, hook: impl InvalidationHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    fn authorize(
        &self,
        actor: &Actor,
        header: &InvoiceHeader,
        mode: AccessMode,
    ) -> Result<(), InvoiceError> {
        authorize(actor, &ownership(header), mode, self.config.group_access)
    }

    fn due_date(&self, issued_at: &TimeStamp<Utc>) -> Option<TimeStamp<Utc>> {
        self.config
            .payment_terms_days
            .map(|days| issued_at.plus_days(days))
    }

    fn publish(
        &self,
        invoice: &Invoice,
        kind: MutationKind,
        touched_stock: bool,
        revision: Option<String>,
    ) -> MutationEvent {
        let event = MutationEvent::new(
            invoice.id(),
            &invoice.header.invoice_number,
            kind,
            touched_stock,
            revision,
        );

        for hook in &self.hooks {
            hook.invalidate(&event);
        }

        event
    }

    fn publish_committed(&self, committed: &Committed, kind: MutationKind) -> MutationEvent {
        self.publish(
            &committed.after,
            kind,
            committed.touched_stock,
            Some(committed.revision.clone()),
        )
    }

    fn insert_draft(
        &self,
        draft: &InvoiceDraft,
        actor: &Actor,
        status: InvoiceStatus,
    ) -> anyhow::Result<Committed> {
        let prepared = draft.validate_and_finalise()?;
        let now = TimeStamp::new();
        let issuing = status == InvoiceStatus::Issued;

        let issued_at = issuing.then(|| now.clone());
        let due_at = prepared.due_at.clone().or_else(|| {
            issued_at
                .as_ref()
                .and_then(|issued_at| self.due_date(issued_at))
        });

        let header = InvoiceHeader {
            id: utils::new_invoice_id()?,
            invoice_number: prepared.invoice_number.clone().unwrap_or_default(),
            status,
            customer_id: prepared.customer_id.clone(),
            vehicle_id: prepared.vehicle_id.clone(),
            notes: prepared.notes.clone(),
            subtotal_ht: prepared.totals.subtotal_ht,
            vat_total: prepared.totals.vat_total,
            total_ttc: prepared.totals.total_ttc,
            issued_at,
            paid_at: None,
            due_at,
            created_by_id: actor.id.clone(),
            group_id: actor.group_id.clone(),
            created_at: now.clone(),
            updated_at: now,
            item_count: prepared.items.len() as u32,
        };

        let stock = issuing.then_some(StockMove::Consume);
        Ok(self.store.insert(header, prepared.items, stock)?)
    }

    /// Create a new DRAFT invoice owned by the acting user and their group
    #[instrument(skip(self, draft, actor), fields(actor_id = %actor.id))]
    pub fn create_invoice(&self, draft: InvoiceDraft, actor: &Actor) -> anyhow::Result<Invoice> {
        let committed = self.insert_draft(&draft, actor, InvoiceStatus::Draft)?;
        self.publish_committed(&committed, MutationKind::Created);

        info!(
            invoice_id = committed.after.id(),
            number = %committed.after.header.invoice_number,
            "invoice created"
        );
        Ok(committed.after)
    }

    /// Create an invoice directly in ISSUED, consuming part stock in the same write
    #[instrument(skip(self, draft, actor), fields(actor_id = %actor.id))]
    pub fn create_and_issue_invoice(
        &self,
        draft: InvoiceDraft,
        actor: &Actor,
    ) -> anyhow::Result<Invoice> {
        let committed = self.insert_draft(&draft, actor, InvoiceStatus::Issued)?;
        self.publish_committed(&committed, MutationKind::Created);

        info!(
            invoice_id = committed.after.id(),
            number = %committed.after.header.invoice_number,
            "invoice created and issued"
        );
        Ok(committed.after)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn get_invoice(&self, invoice_id: &str, actor: &Actor) -> anyhow::Result<Invoice> {
        let invoice = self
            .store
            .load(invoice_id)?
            .ok_or_else(|| InvoiceError::NotFound(invoice_id.to_string()))?;

        self.authorize(actor, &invoice.header, AccessMode::Read)?;
        Ok(invoice)
    }

    /// Invoices visible to the actor, newest first, with summary counters
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn list_invoices(&self, actor: &Actor) -> anyhow::Result<InvoiceListing> {
        let visible = self
            .store
            .headers()?
            .into_iter()
            .filter(|header| {
                can_access(
                    actor,
                    &ownership(header),
                    AccessMode::Read,
                    self.config.group_access,
                )
            })
            .collect();

        Ok(InvoiceListing::new(visible))
    }

    /// Replace header and lines of a DRAFT or ISSUED invoice, recomputing totals
    #[instrument(skip(self, draft, actor), fields(actor_id = %actor.id))]
    pub fn update_invoice(
        &self,
        invoice_id: &str,
        draft: InvoiceDraft,
        actor: &Actor,
    ) -> anyhow::Result<Invoice> {
        let now = TimeStamp::new();

        let committed = self.store.replace(invoice_id, |current| {
            self.authorize(actor, &current.header, AccessMode::Write)?;
            current.status().ensure_editable()?;

            let prepared = draft.validate_and_finalise()?;
            let mut header = current.header.clone();

            if let Some(number) = &prepared.invoice_number {
                if *number != header.invoice_number {
                    if header.status != InvoiceStatus::Draft {
                        return Err(InvoiceError::Validation(
                            "le numéro d'une facture émise ne peut plus changer".into(),
                        ));
                    }
                    header.invoice_number = number.clone();
                }
            }

            header.customer_id = prepared.customer_id.clone();
            header.vehicle_id = prepared.vehicle_id.clone();
            header.notes = prepared.notes.clone();
            if prepared.due_at.is_some() {
                header.due_at = prepared.due_at.clone();
            }
            header.subtotal_ht = prepared.totals.subtotal_ht;
            header.vat_total = prepared.totals.vat_total;
            header.total_ttc = prepared.totals.total_ttc;
            header.updated_at = now.clone();

            Ok(Replacement {
                header,
                items: Some(prepared.items),
                stock: None,
            })
        })?;

        self.publish_committed(&committed, MutationKind::Updated);
        info!(invoice_id, total_ttc = %committed.after.header.total_ttc, "invoice updated");

        Ok(committed.after)
    }

    /// Move an invoice through the lifecycle, applying the transition's side effects
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn change_status(
        &self,
        invoice_id: &str,
        target: InvoiceStatus,
        actor: &Actor,
    ) -> anyhow::Result<Invoice> {
        let now = TimeStamp::new();

        let committed = self.store.replace(invoice_id, |current| {
            self.authorize(actor, &current.header, AccessMode::Write)?;
            let transition = current
                .status()
                .transition_to(target, self.config.stock_policy)?;

            let mut header = current.header.clone();
            header.status = target;
            header.updated_at = now.clone();

            if transition.stamp_issued_at && header.issued_at.is_none() {
                header.issued_at = Some(now.clone());
            }
            if transition.stamp_issued_at && header.due_at.is_none() {
                header.due_at = header
                    .issued_at
                    .as_ref()
                    .and_then(|issued_at| self.due_date(issued_at));
            }
            if transition.stamp_paid_at {
                header.paid_at = Some(now.clone());
            }

            let stock = if transition.decrement_stock {
                Some(StockMove::Consume)
            } else if transition.restore_stock {
                Some(StockMove::Restore)
            } else {
                None
            };

            Ok(Replacement {
                header,
                items: None,
                stock,
            })
        })?;

        let from = committed.before.status();
        self.publish_committed(&committed, MutationKind::StatusChanged { from, to: target });
        info!(invoice_id, %from, to = %target, "invoice status changed");

        Ok(committed.after)
    }

    /// Delete a DRAFT or CANCELED invoice with its lines
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn delete_invoice(&self, invoice_id: &str, actor: &Actor) -> anyhow::Result<()> {
        let removed = self.store.remove(invoice_id, |current| {
            self.authorize(actor, &current.header, AccessMode::Write)?;
            current.status().ensure_deletable()
        })?;

        self.publish(&removed, MutationKind::Deleted, false, None);
        info!(invoice_id, "invoice deleted");

        Ok(())
    }

    /// Copy customer, vehicle, notes and lines into a fresh DRAFT owned by the actor
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub fn duplicate_invoice(&self, invoice_id: &str, actor: &Actor) -> anyhow::Result<Invoice> {
        let source = self.get_invoice(invoice_id, actor)?;

        let committed = self.insert_draft(&source.to_draft(), actor, InvoiceStatus::Draft)?;
        self.publish_committed(&committed, MutationKind::Duplicated);

        info!(
            source_id = invoice_id,
            invoice_id = committed.after.id(),
            number = %committed.after.header.invoice_number,
            "invoice duplicated"
        );
        Ok(committed.after)
    }

    /// Forces committed writes to disk, e.g. before shutdown.
    pub fn flush(&self) -> anyhow::Result<()> {
        Ok(self.store.flush()?)
    }

    pub fn put_part(&self, part: &Part) -> anyhow::Result<()> {
        Ok(self.store.put_part(part)?)
    }

    pub fn part(&self, part_id: &str) -> anyhow::Result<Option<Part>> {
        Ok(self.store.part(part_id)?)
    }
}
