use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kontor_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Money, OrganizationId, Rounding,
};
use kontor_events::Event;
use kontor_numbering::GeneratedNumber;

use crate::payment::{PaymentId, PaymentMethod};
use crate::schedule::{self, InstallmentSchedule, InstallmentStatus};

/// Invoice identifier (organization-scoped via `organization_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Client identifier (master-data CRUD for clients is out of scope; the
/// ledger only carries the reference).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub AggregateId);

impl ClientId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice reconciliation lifecycle. `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

/// Aggregate root: Invoice ledger.
///
/// Owns the status machine, the remaining balance and the installment
/// schedule. Invariants held after every committed transaction:
/// `remaining == total - sum(applied payments)`, `remaining` never negative,
/// `Paid ⇔ remaining == 0`, `PartiallyPaid ⇔ 0 < remaining < total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    organization_id: Option<OrganizationId>,
    number: Option<GeneratedNumber>,
    client_id: Option<ClientId>,
    total: Money,
    remaining: Money,
    status: InvoiceStatus,
    rounding: Rounding,
    schedule: Option<InstallmentSchedule>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            organization_id: None,
            number: None,
            client_id: None,
            total: Money::ZERO,
            remaining: Money::ZERO,
            status: InvoiceStatus::Draft,
            rounding: Rounding::default(),
            schedule: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    pub fn number(&self) -> Option<&GeneratedNumber> {
        self.number.as_ref()
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn remaining(&self) -> Money {
        self.remaining
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn schedule(&self) -> Option<&InstallmentSchedule> {
        self.schedule.as_ref()
    }

    /// Point-in-time state row for the store (explicit version for the
    /// compare-and-swap commit) and for callers to render.
    pub fn snapshot(&self) -> Result<InvoiceSnapshot, DomainError> {
        let (Some(organization_id), Some(number), Some(client_id)) =
            (self.organization_id, self.number.clone(), self.client_id)
        else {
            return Err(DomainError::not_found());
        };
        Ok(InvoiceSnapshot {
            id: self.id,
            organization_id,
            number,
            client_id,
            total: self.total,
            remaining: self.remaining,
            status: self.status,
            rounding: self.rounding,
            schedule: self.schedule.clone(),
            version: self.version,
        })
    }

    /// Rehydrate from a stored state row.
    pub fn from_snapshot(s: InvoiceSnapshot) -> Self {
        Self {
            id: s.id,
            organization_id: Some(s.organization_id),
            number: Some(s.number),
            client_id: Some(s.client_id),
            total: s.total,
            remaining: s.remaining,
            status: s.status,
            rounding: s.rounding,
            schedule: s.schedule,
            version: s.version,
            created: true,
        }
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Stored/rendered invoice state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: InvoiceId,
    pub organization_id: OrganizationId,
    pub number: GeneratedNumber,
    pub client_id: ClientId,
    pub total: Money,
    pub remaining: Money,
    pub status: InvoiceStatus,
    pub rounding: Rounding,
    pub schedule: Option<InstallmentSchedule>,
    pub version: u64,
}

// -------------------------
// Commands
// -------------------------

/// Command: CreateInvoice. The document number is allocated beforehand by the
/// number generator; creation consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub number: GeneratedNumber,
    pub client_id: ClientId,
    pub total: Money,
    pub rounding: Rounding,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinalizeInvoice (Draft -> Sent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeInvoice {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPayment {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    /// When set, the payment settles this installment of the schedule.
    pub installment_no: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice (Draft/Sent only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PlanInstallments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInstallments {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub count: u32,
    pub first_due_date: NaiveDate,
    pub interval_days: u32,
    pub discount_rate: Option<Decimal>,
    pub grace_days: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    FinalizeInvoice(FinalizeInvoice),
    ApplyPayment(ApplyPayment),
    CancelInvoice(CancelInvoice),
    PlanInstallments(PlanInstallments),
}

// -------------------------
// Events
// -------------------------

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub number: GeneratedNumber,
    pub client_id: ClientId,
    pub total: Money,
    pub rounding: Rounding,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceFinalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFinalized {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentApplied.
///
/// Carries the post-application balance and status so consumers (and the
/// state row) never re-derive them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApplied {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub new_remaining: Money,
    pub new_status: InvoiceStatus,
    /// Installment settled by this payment, if any.
    pub settled_installment: Option<u32>,
    /// Escompte granted when the settled installment was discount-eligible.
    /// Informational: the balance moves only by `amount`; crediting the
    /// escompte is the caller's decision.
    pub discount: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InstallmentsPlanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentsPlanned {
    pub organization_id: OrganizationId,
    pub invoice_id: InvoiceId,
    pub schedule: InstallmentSchedule,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceFinalized(InvoiceFinalized),
    PaymentApplied(PaymentApplied),
    InvoiceCancelled(InvoiceCancelled),
    InstallmentsPlanned(InstallmentsPlanned),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::InvoiceFinalized(_) => "invoicing.invoice.finalized",
            InvoiceEvent::PaymentApplied(_) => "invoicing.invoice.payment_applied",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
            InvoiceEvent::InstallmentsPlanned(_) => "invoicing.invoice.installments_planned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceFinalized(e) => e.occurred_at,
            InvoiceEvent::PaymentApplied(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
            InvoiceEvent::InstallmentsPlanned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.organization_id = Some(e.organization_id);
                self.number = Some(e.number.clone());
                self.client_id = Some(e.client_id);
                self.total = e.total;
                self.remaining = e.total;
                self.rounding = e.rounding;
                self.status = InvoiceStatus::Draft;
                self.schedule = None;
                self.created = true;
            }
            InvoiceEvent::InvoiceFinalized(_) => {
                self.status = InvoiceStatus::Sent;
            }
            InvoiceEvent::PaymentApplied(e) => {
                self.remaining = e.new_remaining;
                self.status = e.new_status;
                if let Some(schedule) = &mut self.schedule {
                    for inst in &mut schedule.installments {
                        if Some(inst.sequence_no) == e.settled_installment {
                            inst.status = InstallmentStatus::Paid;
                        } else if inst.status == InstallmentStatus::Pending
                            && inst.due_date < e.date
                        {
                            inst.status = InstallmentStatus::Overdue;
                        }
                    }
                }
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.status = InvoiceStatus::Cancelled;
            }
            InvoiceEvent::InstallmentsPlanned(e) => {
                self.schedule = Some(e.schedule.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::FinalizeInvoice(cmd) => self.handle_finalize(cmd),
            InvoiceCommand::ApplyPayment(cmd) => self.handle_apply_payment(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
            InvoiceCommand::PlanInstallments(cmd) => self.handle_plan(cmd),
        }
    }
}

impl Invoice {
    fn ensure_organization(&self, organization_id: OrganizationId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.organization_id != Some(organization_id) {
            return Err(DomainError::validation("organization mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::validation("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::validation("invoice already exists"));
        }
        if !cmd.total.is_positive() {
            return Err(DomainError::validation("invoice total must be positive"));
        }

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            organization_id: cmd.organization_id,
            invoice_id: cmd.invoice_id,
            number: cmd.number.clone(),
            client_id: cmd.client_id,
            total: cmd.total,
            rounding: cmd.rounding,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_finalize(&self, cmd: &FinalizeInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invoice_closed(format!(
                "invoice is {}",
                self.status.as_str()
            )));
        }
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::validation(
                "only draft invoices can be finalized",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceFinalized(InvoiceFinalized {
            organization_id: cmd.organization_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_payment(&self, cmd: &ApplyPayment) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invoice_closed(format!(
                "cannot apply a payment to a {} invoice",
                self.status.as_str()
            )));
        }
        if self.status == InvoiceStatus::Draft {
            return Err(DomainError::validation(
                "cannot apply a payment to a draft invoice; finalize it first",
            ));
        }

        match cmd.method {
            PaymentMethod::Reversal => {
                if !cmd.amount.is_negative() {
                    return Err(DomainError::validation(
                        "reversal payments must carry a negative amount",
                    ));
                }
                if cmd.installment_no.is_some() {
                    return Err(DomainError::validation(
                        "reversal payments cannot settle an installment",
                    ));
                }
            }
            _ => {
                if !cmd.amount.is_positive() {
                    return Err(DomainError::validation("payment amount must be positive"));
                }
            }
        }

        let new_remaining = self.remaining.checked_sub(cmd.amount)?;
        if new_remaining.is_negative() {
            // No clamping, no automatic credit note: the caller decides.
            return Err(DomainError::overpayment(format!(
                "payment of {} exceeds remaining balance {}",
                cmd.amount, self.remaining
            )));
        }
        if new_remaining > self.total {
            return Err(DomainError::validation(
                "reversal exceeds the sum of applied payments",
            ));
        }

        let mut settled_installment = None;
        let mut discount = None;
        if let Some(no) = cmd.installment_no {
            let schedule = self.schedule.as_ref().ok_or_else(|| {
                DomainError::validation("invoice has no installment schedule")
            })?;
            let installment = schedule
                .installment(no)
                .ok_or_else(|| DomainError::validation(format!("unknown installment {no}")))?;
            if installment.status == InstallmentStatus::Paid {
                return Err(DomainError::validation(format!(
                    "installment {no} is already settled"
                )));
            }
            if installment.is_discount_eligible(cmd.date, schedule.grace_days) {
                discount = Some(installment.discount_amount(self.rounding)?);
            }
            // Settling an installment requires covering it, net of any
            // earned discount. Smaller amounts go through as plain
            // partial payments without naming the installment.
            let mut required = installment.amount;
            if let Some(d) = discount {
                required = required.checked_sub(d)?;
            }
            if cmd.amount < required {
                return Err(DomainError::validation(format!(
                    "payment of {} does not cover installment {no} ({} due)",
                    cmd.amount, required
                )));
            }
            settled_installment = Some(no);
        }

        let new_status = if new_remaining.is_zero() {
            InvoiceStatus::Paid
        } else if new_remaining == self.total {
            // A reversal put the full balance back on the table.
            InvoiceStatus::Sent
        } else {
            InvoiceStatus::PartiallyPaid
        };

        Ok(vec![InvoiceEvent::PaymentApplied(PaymentApplied {
            organization_id: cmd.organization_id,
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            date: cmd.date,
            method: cmd.method,
            new_remaining,
            new_status,
            settled_installment,
            discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invoice_closed(format!(
                "invoice is already {}",
                self.status.as_str()
            )));
        }
        if self.status == InvoiceStatus::PartiallyPaid {
            return Err(DomainError::validation(
                "cannot cancel a partially paid invoice",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            organization_id: cmd.organization_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_plan(&self, cmd: &PlanInstallments) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_organization(cmd.organization_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invoice_closed(format!(
                "invoice is {}",
                self.status.as_str()
            )));
        }
        // Any applied payment freezes the schedule.
        if self.remaining != self.total
            || self
                .schedule
                .as_ref()
                .is_some_and(InstallmentSchedule::has_settled_installment)
        {
            return Err(DomainError::schedule_locked(
                "installments are immutable once a payment has been recorded",
            ));
        }

        let installments = schedule::plan_installments(
            self.total,
            cmd.count,
            cmd.first_due_date,
            cmd.interval_days,
            cmd.discount_rate,
            self.rounding,
        )?;

        Ok(vec![InvoiceEvent::InstallmentsPlanned(InstallmentsPlanned {
            organization_id: cmd.organization_id,
            invoice_id: cmd.invoice_id,
            schedule: InstallmentSchedule {
                grace_days: cmd.grace_days,
                installments,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kontor_core::AggregateId;
    use kontor_numbering::{DocumentType, NumberingPolicy};
    use proptest::prelude::*;

    fn test_org() -> OrganizationId {
        OrganizationId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_client_id() -> ClientId {
        ClientId::new(AggregateId::new())
    }

    fn test_payment_id() -> PaymentId {
        PaymentId::new(AggregateId::new())
    }

    fn test_number(org: OrganizationId) -> GeneratedNumber {
        let policy = NumberingPolicy::default_for(org, DocumentType::Invoice);
        let now = Utc::now();
        let period = policy.period_key(now);
        policy.format_number(now, &period, 1).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn eur(minor: i64) -> Money {
        Money::from_minor_units(minor, 2)
    }

    /// Sent invoice over 1000.00 with the given org/ids.
    fn sent_invoice(org: OrganizationId, invoice_id: InvoiceId) -> Invoice {
        let mut invoice = Invoice::empty(invoice_id);
        let events = invoice
            .handle(&InvoiceCommand::CreateInvoice(CreateInvoice {
                organization_id: org,
                invoice_id,
                number: test_number(org),
                client_id: test_client_id(),
                total: eur(100_000),
                rounding: Rounding::default(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
        let events = invoice
            .handle(&InvoiceCommand::FinalizeInvoice(FinalizeInvoice {
                organization_id: org,
                invoice_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
        invoice
    }

    fn pay(invoice: &mut Invoice, org: OrganizationId, minor: i64, date: NaiveDate) {
        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: invoice.id_typed(),
                payment_id: test_payment_id(),
                amount: eur(minor),
                date,
                method: PaymentMethod::Transfer,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
    }

    #[test]
    fn partial_then_full_payment_reaches_paid() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        assert_eq!(invoice.status(), InvoiceStatus::Sent);

        pay(&mut invoice, org, 40_000, d(2025, 5, 1));
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.remaining(), eur(60_000));

        pay(&mut invoice, org, 60_000, d(2025, 5, 20));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.remaining(), eur(0));
    }

    #[test]
    fn overpayment_is_rejected_and_state_unchanged() {
        let org = test_org();
        let id = test_invoice_id();
        let invoice = sent_invoice(org, id);
        let before = invoice.clone();

        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(150_000),
                date: d(2025, 5, 1),
                method: PaymentMethod::Transfer,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert!(matches!(err, DomainError::Overpayment(_)));
        assert_eq!(invoice, before);
        assert_eq!(invoice.status(), InvoiceStatus::Sent);
    }

    #[test]
    fn payments_on_terminal_invoices_fail_with_invoice_closed() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        pay(&mut invoice, org, 100_000, d(2025, 5, 1));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);

        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(1),
                date: d(2025, 5, 2),
                method: PaymentMethod::Transfer,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvoiceClosed(_)));
    }

    #[test]
    fn draft_invoices_do_not_accept_payments() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = Invoice::empty(id);
        let events = invoice
            .handle(&InvoiceCommand::CreateInvoice(CreateInvoice {
                organization_id: org,
                invoice_id: id,
                number: test_number(org),
                client_id: test_client_id(),
                total: eur(100_000),
                rounding: Rounding::default(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }

        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(100),
                date: d(2025, 5, 1),
                method: PaymentMethod::Transfer,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cancel_is_allowed_from_draft_and_sent_only() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);

        // partially paid -> cancel rejected
        pay(&mut invoice, org, 10_000, d(2025, 5, 1));
        let err = invoice
            .handle(&InvoiceCommand::CancelInvoice(CancelInvoice {
                organization_id: org,
                invoice_id: id,
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // fresh sent invoice -> cancel ok, then terminal
        let id2 = test_invoice_id();
        let mut invoice2 = sent_invoice(org, id2);
        let events = invoice2
            .handle(&InvoiceCommand::CancelInvoice(CancelInvoice {
                organization_id: org,
                invoice_id: id2,
                reason: Some("client withdrew".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice2.apply(e);
        }
        assert_eq!(invoice2.status(), InvoiceStatus::Cancelled);

        let err = invoice2
            .handle(&InvoiceCommand::CancelInvoice(CancelInvoice {
                organization_id: org,
                invoice_id: id2,
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvoiceClosed(_)));
    }

    #[test]
    fn reversal_restores_balance_and_status() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        pay(&mut invoice, org, 40_000, d(2025, 5, 1));
        assert_eq!(invoice.status(), InvoiceStatus::PartiallyPaid);

        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(-40_000),
                date: d(2025, 5, 2),
                method: PaymentMethod::Reversal,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
        assert_eq!(invoice.remaining(), eur(100_000));
        assert_eq!(invoice.status(), InvoiceStatus::Sent);

        // reversing more than was applied is rejected
        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(-1),
                date: d(2025, 5, 3),
                method: PaymentMethod::Reversal,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn positive_amount_with_reversal_method_is_rejected() {
        let org = test_org();
        let id = test_invoice_id();
        let invoice = sent_invoice(org, id);
        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(100),
                date: d(2025, 5, 1),
                method: PaymentMethod::Reversal,
                installment_no: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    fn plan(invoice: &mut Invoice, org: OrganizationId, count: u32, rate: Option<Decimal>) {
        let events = invoice
            .handle(&InvoiceCommand::PlanInstallments(PlanInstallments {
                organization_id: org,
                invoice_id: invoice.id_typed(),
                count,
                first_due_date: d(2025, 6, 30),
                interval_days: 30,
                discount_rate: rate,
                grace_days: 10,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
    }

    #[test]
    fn planned_installments_sum_to_total() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, None);

        let schedule = invoice.schedule().unwrap();
        assert_eq!(schedule.installments.len(), 3);
        let mut sum = Money::ZERO;
        for inst in &schedule.installments {
            sum = sum.checked_add(inst.amount).unwrap();
        }
        assert_eq!(sum, invoice.total());
    }

    #[test]
    fn replanning_after_a_payment_is_schedule_locked() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, None);
        pay(&mut invoice, org, 10_000, d(2025, 6, 1));

        let err = invoice
            .handle(&InvoiceCommand::PlanInstallments(PlanInstallments {
                organization_id: org,
                invoice_id: id,
                count: 2,
                first_due_date: d(2025, 7, 1),
                interval_days: 30,
                discount_rate: None,
                grace_days: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::ScheduleLocked(_)));
    }

    #[test]
    fn settling_an_installment_early_grants_the_escompte() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, Some(Decimal::new(2, 2))); // 2%

        // first installment: 333.33 due 2025-06-30, grace 10 days
        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(33_333),
                date: d(2025, 6, 15),
                method: PaymentMethod::Transfer,
                installment_no: Some(1),
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            InvoiceEvent::PaymentApplied(e) => {
                assert_eq!(e.settled_installment, Some(1));
                // 333.33 * 2% = 6.6666 -> 6.67 half-up
                assert_eq!(e.discount, Some(eur(667)));
            }
            other => panic!("expected PaymentApplied, got {other:?}"),
        }

        for e in &events {
            invoice.apply(e);
        }
        let schedule = invoice.schedule().unwrap();
        assert_eq!(
            schedule.installment(1).unwrap().status,
            InstallmentStatus::Paid
        );
    }

    #[test]
    fn undersized_payment_cannot_settle_an_installment() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, Some(Decimal::new(2, 2)));

        // a token amount cannot mark 333.33 as paid
        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(1),
                date: d(2025, 6, 15),
                method: PaymentMethod::Transfer,
                installment_no: Some(1),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn paying_the_discounted_amount_settles_the_installment() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, Some(Decimal::new(2, 2)));

        // 333.33 less the 6.67 escompte
        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(32_666),
                date: d(2025, 6, 15),
                method: PaymentMethod::Transfer,
                installment_no: Some(1),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            InvoiceEvent::PaymentApplied(e) => {
                assert_eq!(e.settled_installment, Some(1));
                assert_eq!(e.discount, Some(eur(667)));
            }
            other => panic!("expected PaymentApplied, got {other:?}"),
        }
        for e in &events {
            invoice.apply(e);
        }
        assert_eq!(
            invoice.schedule().unwrap().installment(1).unwrap().status,
            InstallmentStatus::Paid
        );
    }

    #[test]
    fn late_settlement_gets_no_discount_and_marks_overdue() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 2, Some(Decimal::new(2, 2)));

        // pay installment 2 after installment 1's due date
        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(50_000),
                date: d(2025, 7, 15),
                method: PaymentMethod::Transfer,
                installment_no: Some(2),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            InvoiceEvent::PaymentApplied(e) => assert_eq!(e.discount, None),
            other => panic!("expected PaymentApplied, got {other:?}"),
        }
        for e in &events {
            invoice.apply(e);
        }

        let schedule = invoice.schedule().unwrap();
        assert_eq!(
            schedule.installment(1).unwrap().status,
            InstallmentStatus::Overdue
        );
        assert_eq!(
            schedule.installment(2).unwrap().status,
            InstallmentStatus::Paid
        );
    }

    #[test]
    fn settling_the_same_installment_twice_is_rejected() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, None);

        let events = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(33_333),
                date: d(2025, 6, 1),
                method: PaymentMethod::Transfer,
                installment_no: Some(1),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }

        let err = invoice
            .handle(&InvoiceCommand::ApplyPayment(ApplyPayment {
                organization_id: org,
                invoice_id: id,
                payment_id: test_payment_id(),
                amount: eur(33_333),
                date: d(2025, 6, 2),
                method: PaymentMethod::Transfer,
                installment_no: Some(1),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn snapshot_round_trips_through_rehydration() {
        let org = test_org();
        let id = test_invoice_id();
        let mut invoice = sent_invoice(org, id);
        plan(&mut invoice, org, 3, None);
        pay(&mut invoice, org, 25_000, d(2025, 6, 1));

        let snapshot = invoice.snapshot().unwrap();
        assert_eq!(snapshot.version, invoice.version());

        let rehydrated = Invoice::from_snapshot(snapshot);
        assert_eq!(rehydrated, invoice);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of payments summing to the total ends in
        /// Paid with a zero balance, and the balance invariant
        /// `remaining == total - sum(applied)` holds after every step.
        #[test]
        fn payment_sequences_reconcile_exactly(
            cuts in prop::collection::vec(1i64..100_000i64, 1..8)
        ) {
            let org = test_org();
            let id = test_invoice_id();

            // Total is the sum of the generated payments, so the sequence
            // settles the invoice exactly.
            let total: i64 = cuts.iter().sum();
            let mut invoice = Invoice::empty(id);
            let create = InvoiceCommand::CreateInvoice(CreateInvoice {
                organization_id: org,
                invoice_id: id,
                number: test_number(org),
                client_id: test_client_id(),
                total: eur(total),
                rounding: Rounding::default(),
                occurred_at: test_time(),
            });
            for e in &invoice.handle(&create).unwrap() {
                invoice.apply(e);
            }
            let finalize = InvoiceCommand::FinalizeInvoice(FinalizeInvoice {
                organization_id: org,
                invoice_id: id,
                occurred_at: test_time(),
            });
            for e in &invoice.handle(&finalize).unwrap() {
                invoice.apply(e);
            }

            let mut applied: i64 = 0;
            for cut in &cuts {
                pay(&mut invoice, org, *cut, d(2025, 5, 1));
                applied += cut;

                prop_assert_eq!(invoice.remaining(), eur(total - applied));
                prop_assert!(!invoice.remaining().is_negative());
                let expected = if applied == total {
                    InvoiceStatus::Paid
                } else {
                    InvoiceStatus::PartiallyPaid
                };
                prop_assert_eq!(invoice.status(), expected);
            }

            prop_assert_eq!(invoice.status(), InvoiceStatus::Paid);
            prop_assert!(invoice.remaining().is_zero());
        }
    }
}
