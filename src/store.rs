//! sled-backed persistence for invoices, their lines, numbers and stock
//!
//! Every write goes through one multi-tree transaction so that the header,
//! its lines, the number index, the sequence counter and part stock commit
//! together. sled re-runs a transaction closure on conflict, which is what
//! makes the counter and stock read-modify-writes safe.
use crate::config::InvoiceConfig;
use crate::error::InvoiceError;
use crate::inventory::{Part, StockMove, part_quantities};
use crate::invoice::{Invoice, InvoiceHeader, InvoiceItem};
use crate::numbering::InvoiceNumber;
use rust_decimal::Decimal;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree, abort,
};
use sled::{Db, Transactional, Tree};
use std::sync::Arc;

const INVOICES: &str = "invoices";
const ITEMS: &str = "invoice_items";
const NUMBERS: &str = "invoice_numbers";
const PARTS: &str = "parts";
const COUNTERS: &str = "counters";
const INVOICE_SEQ: &[u8] = b"invoice_seq";

type TxResult<T> = ConflictableTransactionResult<T, InvoiceError>;

/// New state for an existing invoice, produced from its committed state.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub header: InvoiceHeader,
    /// `None` keeps the stored lines.
    pub items: Option<Vec<InvoiceItem>>,
    pub stock: Option<StockMove>,
}

#[derive(Debug, Clone)]
pub struct Committed {
    pub before: Invoice,
    pub after: Invoice,
    pub touched_stock: bool,
    /// `Invoice::fingerprint` of `after`, taken before commit.
    pub revision: String,
}

pub struct InvoiceStore {
    instance: Arc<Db>,
    invoices: Tree,
    items: Tree,
    numbers: Tree,
    parts: Tree,
    counters: Tree,
    number_prefix: String,
    number_width: usize,
    allow_negative_stock: bool,
}

pub fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, InvoiceError> {
    Ok(minicbor::to_vec(value)?)
}

pub fn decode<T>(bytes: &[u8]) -> Result<T, InvoiceError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn item_key(invoice_id: &str, position: u32) -> String {
    format!("{invoice_id}/{position:06}")
}

fn aborting<T>(result: Result<T, InvoiceError>) -> TxResult<T> {
    result.map_err(ConflictableTransactionError::Abort)
}

fn flatten<T>(result: TransactionResult<T, InvoiceError>) -> Result<T, InvoiceError> {
    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => InvoiceError::Storage(e),
    })
}

fn tx_load(
    invoices: &TransactionalTree,
    items: &TransactionalTree,
    id: &str,
) -> TxResult<Option<Invoice>> {
    let Some(raw) = invoices.get(id.as_bytes())? else {
        return Ok(None);
    };
    let header: InvoiceHeader = aborting(decode(&raw))?;

    let mut lines = Vec::with_capacity(header.item_count as usize);
    for position in 0..header.item_count {
        match items.get(item_key(id, position).as_bytes())? {
            Some(raw) => lines.push(aborting(decode(&raw))?),
            None => {
                return abort(InvoiceError::Encoding(format!(
                    "ligne {position} manquante pour {id}"
                )));
            }
        }
    }

    Ok(Some(Invoice {
        header,
        items: lines,
    }))
}

fn tx_replace_items(
    items: &TransactionalTree,
    id: &str,
    old_count: u32,
    new_items: &[InvoiceItem],
) -> TxResult<()> {
    for position in 0..old_count {
        items.remove(item_key(id, position).as_bytes())?;
    }
    for item in new_items {
        items.insert(item_key(id, item.position).as_bytes(), aborting(encode(item))?)?;
    }
    Ok(())
}

impl InvoiceStore {
    pub fn open(instance: Arc<Db>, config: &InvoiceConfig) -> Result<Self, InvoiceError> {
        Ok(Self {
            invoices: instance.open_tree(INVOICES)?,
            items: instance.open_tree(ITEMS)?,
            numbers: instance.open_tree(NUMBERS)?,
            parts: instance.open_tree(PARTS)?,
            counters: instance.open_tree(COUNTERS)?,
            instance,
            number_prefix: config.number_prefix.clone(),
            number_width: config.number_width,
            allow_negative_stock: config.allow_negative_stock,
        })
    }

    /// Waits until every committed write is durable on disk.
    pub fn flush(&self) -> Result<(), InvoiceError> {
        self.instance.flush()?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Option<Invoice>, InvoiceError> {
        let Some(raw) = self.invoices.get(id.as_bytes())? else {
            return Ok(None);
        };
        let header: InvoiceHeader = decode(&raw)?;

        let mut items = Vec::with_capacity(header.item_count as usize);
        for entry in self.items.scan_prefix(format!("{id}/")) {
            let (_, raw) = entry?;
            items.push(decode::<InvoiceItem>(&raw)?);
        }
        items.sort_by_key(|item| item.position);

        Ok(Some(Invoice { header, items }))
    }

    pub fn headers(&self) -> Result<Vec<InvoiceHeader>, InvoiceError> {
        self.invoices
            .iter()
            .map(|entry| {
                let (_, raw) = entry?;
                decode(&raw)
            })
            .collect()
    }

    pub fn id_for_number(&self, number: &str) -> Result<Option<String>, InvoiceError> {
        Ok(self
            .numbers
            .get(number.as_bytes())?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    pub fn put_part(&self, part: &Part) -> Result<(), InvoiceError> {
        self.parts.insert(part.id.as_bytes(), encode(part)?)?;
        Ok(())
    }

    pub fn part(&self, id: &str) -> Result<Option<Part>, InvoiceError> {
        self.parts
            .get(id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// Writes a new invoice. An empty `invoice_number` is filled from the
    /// sequence; a supplied one must not be taken.
    pub fn insert(
        &self,
        header: InvoiceHeader,
        items: Vec<InvoiceItem>,
        stock: Option<StockMove>,
    ) -> Result<Committed, InvoiceError> {
        let committed = (
            &self.invoices,
            &self.items,
            &self.numbers,
            &self.parts,
            &self.counters,
        )
            .transaction(|(invoices, tx_items, numbers, parts, counters)| {
                let mut header = header.clone();

                if invoices.get(header.id.as_bytes())?.is_some() {
                    return abort(InvoiceError::Validation(format!(
                        "identifiant déjà utilisé: {}",
                        header.id
                    )));
                }

                header.invoice_number = if header.invoice_number.is_empty() {
                    self.tx_next_number(numbers, counters, header.created_at.year())?
                } else {
                    header.invoice_number.clone()
                };
                self.tx_claim_number(numbers, &header.id, &header.invoice_number, None)?;

                header.item_count = items.len() as u32;
                tx_replace_items(tx_items, &header.id, 0, &items)?;
                invoices.insert(header.id.as_bytes(), aborting(encode(&header))?)?;

                let touched_stock = match stock {
                    Some(movement) => self.tx_move_stock(parts, &items, movement)?,
                    None => false,
                };

                let after = Invoice {
                    header,
                    items: items.clone(),
                };
                let revision = aborting(after.fingerprint())?;
                Ok(Committed {
                    before: after.clone(),
                    after,
                    touched_stock,
                    revision,
                })
            });

        flatten(committed)
    }

    /// Rewrites an existing invoice. `change` sees the committed state inside
    /// the transaction and decides the new one, or refuses.
    pub fn replace<F>(&self, id: &str, change: F) -> Result<Committed, InvoiceError>
    where
        F: Fn(&Invoice) -> Result<Replacement, InvoiceError>,
    {
        let committed = (
            &self.invoices,
            &self.items,
            &self.numbers,
            &self.parts,
            &self.counters,
        )
            .transaction(|(invoices, tx_items, numbers, parts, _counters)| {
                let Some(before) = tx_load(invoices, tx_items, id)? else {
                    return abort(InvoiceError::NotFound(id.to_string()));
                };
                let Replacement {
                    mut header,
                    items,
                    stock,
                } = aborting(change(&before))?;

                // identity and ownership are never rewritten here
                header.id = before.header.id.clone();
                header.created_by_id = before.header.created_by_id.clone();
                header.group_id = before.header.group_id.clone();
                header.created_at = before.header.created_at.clone();

                if header.invoice_number != before.header.invoice_number {
                    self.tx_claim_number(
                        numbers,
                        &header.id,
                        &header.invoice_number,
                        Some(&before.header.invoice_number),
                    )?;
                }

                let items = match items {
                    Some(items) => {
                        tx_replace_items(tx_items, id, before.header.item_count, &items)?;
                        items
                    }
                    None => before.items.clone(),
                };
                header.item_count = items.len() as u32;
                invoices.insert(id.as_bytes(), aborting(encode(&header))?)?;

                let touched_stock = match stock {
                    Some(movement) => self.tx_move_stock(parts, &items, movement)?,
                    None => false,
                };

                let after = Invoice { header, items };
                let revision = aborting(after.fingerprint())?;
                Ok(Committed {
                    before,
                    after,
                    touched_stock,
                    revision,
                })
            });

        flatten(committed)
    }

    /// Removes lines, then the header, then the number index entry.
    pub fn remove<F>(&self, id: &str, check: F) -> Result<Invoice, InvoiceError>
    where
        F: Fn(&Invoice) -> Result<(), InvoiceError>,
    {
        let removed = (&self.invoices, &self.items, &self.numbers).transaction(
            |(invoices, tx_items, numbers)| {
                let Some(invoice) = tx_load(invoices, tx_items, id)? else {
                    return abort(InvoiceError::NotFound(id.to_string()));
                };
                aborting(check(&invoice))?;

                tx_replace_items(tx_items, id, invoice.header.item_count, &[])?;
                invoices.remove(id.as_bytes())?;
                numbers.remove(invoice.header.invoice_number.as_bytes())?;

                Ok(invoice)
            },
        );

        flatten(removed)
    }

    fn tx_next_number(
        &self,
        numbers: &TransactionalTree,
        counters: &TransactionalTree,
        year: i32,
    ) -> TxResult<String> {
        let mut sequence = match counters.get(INVOICE_SEQ)? {
            Some(raw) => {
                let bytes: [u8; 8] = match <[u8; 8]>::try_from(&raw[..]) {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        return abort(InvoiceError::Encoding("compteur corrompu".into()));
                    }
                };
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };

        // skip numbers already claimed explicitly
        let number = loop {
            sequence += 1;
            let candidate =
                InvoiceNumber::new(&self.number_prefix, year, sequence).format(self.number_width);
            if numbers.get(candidate.as_bytes())?.is_none() {
                break candidate;
            }
        };

        counters.insert(INVOICE_SEQ, sequence.to_be_bytes().to_vec())?;
        Ok(number)
    }

    fn tx_claim_number(
        &self,
        numbers: &TransactionalTree,
        id: &str,
        number: &str,
        previous: Option<&str>,
    ) -> TxResult<()> {
        if let Some(owner) = numbers.get(number.as_bytes())? {
            if &owner[..] != id.as_bytes() {
                return abort(InvoiceError::DuplicateInvoiceNumber(number.to_string()));
            }
        }
        if let Some(previous) = previous {
            numbers.remove(previous.as_bytes())?;
        }
        numbers.insert(number.as_bytes(), id.as_bytes())?;
        Ok(())
    }

    fn tx_move_stock(
        &self,
        parts: &TransactionalTree,
        items: &[InvoiceItem],
        movement: StockMove,
    ) -> TxResult<bool> {
        let quantities = aborting(part_quantities(items))?;

        for (part_id, quantity) in &quantities {
            let Some(raw) = parts.get(part_id.as_bytes())? else {
                return abort(InvoiceError::UnknownPart(part_id.clone()));
            };
            let mut part: Part = aborting(decode(&raw))?;
            let remaining = aborting(part.stock_after(movement, *quantity))?;

            if remaining < Decimal::ZERO {
                if !self.allow_negative_stock && movement == StockMove::Consume {
                    return abort(InvoiceError::InsufficientStock {
                        part_id: part_id.clone(),
                        available: part.stock_qty,
                        requested: *quantity,
                    });
                }
                tracing::warn!(part_id = %part_id, stock = %remaining, "part stock below zero");
            }

            part.stock_qty = remaining;
            parts.insert(part_id.as_bytes(), aborting(encode(&part))?)?;
        }

        Ok(!quantities.is_empty())
    }
}
