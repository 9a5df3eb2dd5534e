//! Proposals, quotations and cost estimates for the signed-in company.

use chrono::Utc;
use log::{info, warn};

use crate::context::AppContext;
use crate::database::{Page, PageRequest};
use crate::documents::{self, Document};
use crate::error::{AppError, AppResult};
use crate::integrations::{send_quotation, DeliveryReceipt, Mailer};
use crate::models::{
    LineItem, NewQuotation, Notification, Proposal, ProposalFilter, ProposalStatus, Quotation, Role,
};
use crate::utils::logging::log_error_with_context;
use crate::utils::{non_blank, normalize_text};

pub const QUOTATION_STATUSES: &[&str] = &["draft", "sent", "accepted", "rejected"];

pub struct SalesService {
    ctx: AppContext,
}

impl SalesService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    fn ensure_can_sell(&self) -> AppResult<()> {
        self.ctx.session.require_role(Role::Sales)?;
        self.ctx.session.ensure_subscription_active(Utc::now())
    }

    /// Record owner or an admin.
    fn ensure_owner_or_admin(&self, owner_id: &str) -> AppResult<()> {
        if owner_id == self.ctx.session.user_id() {
            return Ok(());
        }
        self.ctx.session.require_role(Role::Admin)
    }

    // --- Proposals ---

    pub async fn create_proposal(&self, client_name: &str, title: &str, sites: Vec<String>) -> AppResult<Proposal> {
        self.ensure_can_sell()?;

        let session = &self.ctx.session;
        let mut proposal = Proposal::new(
            session.company_id(),
            session.user_id(),
            &normalize_text(client_name),
            &normalize_text(title),
        );
        proposal.sites = sites.iter().filter_map(|s| non_blank(Some(s.as_str()))).collect();
        validate_proposal(&proposal)?;

        self.ctx.db.add_proposal(&proposal).await?;
        info!("Created proposal {}", proposal.id);
        Ok(proposal)
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> AppResult<Proposal> {
        let proposal = self
            .ctx
            .db
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("proposal {}", proposal_id)))?;
        self.ctx.session.ensure_same_company(&proposal.company_id)?;
        Ok(proposal)
    }

    /// Saves every editable field; id, company, owner and creation time are
    /// taken from the stored record.
    pub async fn update_proposal(&self, mut proposal: Proposal) -> AppResult<Proposal> {
        self.ensure_can_sell()?;
        let stored = self.get_proposal(&proposal.id).await?;
        self.ensure_owner_or_admin(&stored.created_by)?;

        proposal.company_id = stored.company_id;
        proposal.created_by = stored.created_by;
        proposal.created_at = stored.created_at;
        proposal.client_name = normalize_text(&proposal.client_name);
        proposal.title = normalize_text(&proposal.title);
        proposal.notes = non_blank(proposal.notes.as_deref());
        proposal.updated_at = Utc::now();
        validate_proposal(&proposal)?;

        if !self.ctx.db.update_proposal(&proposal).await? {
            return Err(AppError::not_found(format!("proposal {}", proposal.id)));
        }
        Ok(proposal)
    }

    /// Status changes made by someone other than the owner notify the owner.
    pub async fn set_proposal_status(&self, proposal_id: &str, status: ProposalStatus) -> AppResult<Proposal> {
        self.ensure_can_sell()?;
        let mut proposal = self.get_proposal(proposal_id).await?;
        if proposal.status == status {
            return Ok(proposal);
        }

        proposal.status = status;
        proposal.updated_at = Utc::now();
        self.ctx.db.update_proposal(&proposal).await?;

        if proposal.created_by != self.ctx.session.user_id() {
            let notification = Notification::new(
                &proposal.company_id,
                &proposal.created_by,
                "proposal",
                &format!("Proposal {}", status.as_str()),
                &format!(
                    "{} marked \"{}\" for {} as {}",
                    self.ctx.session.user.display_name,
                    proposal.title,
                    proposal.client_name,
                    status.as_str()
                ),
            );
            self.ctx.db.add_notification(&notification).await?;
        }
        Ok(proposal)
    }

    pub async fn delete_proposal(&self, proposal_id: &str) -> AppResult<()> {
        self.ensure_can_sell()?;
        let proposal = self.get_proposal(proposal_id).await?;
        self.ensure_owner_or_admin(&proposal.created_by)?;

        let attached = self.ctx.db.get_proposal_quotations(&proposal.id).await?;
        if !attached.is_empty() {
            return Err(AppError::invalid_input(format!(
                "proposal has {} quotation(s); delete them first",
                attached.len()
            )));
        }

        self.ctx.db.delete_proposal(&proposal.id).await?;
        info!("Deleted proposal {}", proposal.id);
        Ok(())
    }

    pub async fn search_proposals(&self, filter: &ProposalFilter, page: PageRequest) -> AppResult<Page<Proposal>> {
        let page = self
            .ctx
            .db
            .search_proposals(self.ctx.session.company_id(), filter, page)
            .await?;
        Ok(page)
    }

    pub async fn render_proposal(&self, proposal_id: &str) -> AppResult<Document> {
        let proposal = self.get_proposal(proposal_id).await?;
        Ok(documents::render(&proposal, &self.ctx.session.company))
    }

    // --- Quotations / cost estimates ---

    pub async fn create_quotation(&self, mut new: NewQuotation) -> AppResult<Quotation> {
        self.ensure_can_sell()?;

        if let Some(proposal_id) = new.proposal_id.as_deref() {
            self.get_proposal(proposal_id).await?;
        }
        new.client_name = normalize_text(&new.client_name);
        new.notes = non_blank(new.notes.as_deref());
        validate_quotation(&new.client_name, &new.items, new.tax_rate, new.discount)?;

        let session = &self.ctx.session;
        let quotation = self
            .ctx
            .db
            .add_quotation(session.company_id(), session.user_id(), &new)
            .await?;
        info!("Created {} {}", quotation.kind.label(), quotation.number);
        Ok(quotation)
    }

    pub async fn get_quotation(&self, quotation_id: &str) -> AppResult<Quotation> {
        let quotation = self
            .ctx
            .db
            .get_quotation(quotation_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("quotation {}", quotation_id)))?;
        self.ctx.session.ensure_same_company(&quotation.company_id)?;
        Ok(quotation)
    }

    /// Number, kind and ownership never change after creation.
    pub async fn update_quotation(&self, mut quotation: Quotation) -> AppResult<Quotation> {
        self.ensure_can_sell()?;
        let stored = self.get_quotation(&quotation.id).await?;
        self.ensure_owner_or_admin(&stored.created_by)?;

        if !QUOTATION_STATUSES.contains(&quotation.status.as_str()) {
            return Err(AppError::invalid_input(format!("unknown quotation status '{}'", quotation.status)));
        }
        if let Some(proposal_id) = quotation.proposal_id.as_deref() {
            self.get_proposal(proposal_id).await?;
        }

        quotation.company_id = stored.company_id;
        quotation.number = stored.number;
        quotation.kind = stored.kind;
        quotation.created_by = stored.created_by;
        quotation.created_at = stored.created_at;
        quotation.client_name = normalize_text(&quotation.client_name);
        quotation.notes = non_blank(quotation.notes.as_deref());
        quotation.updated_at = Utc::now();
        validate_quotation(&quotation.client_name, &quotation.items, quotation.tax_rate, quotation.discount)?;

        if !self.ctx.db.update_quotation(&quotation).await? {
            return Err(AppError::not_found(format!("quotation {}", quotation.id)));
        }
        Ok(quotation)
    }

    pub async fn delete_quotation(&self, quotation_id: &str) -> AppResult<()> {
        self.ensure_can_sell()?;
        let quotation = self.get_quotation(quotation_id).await?;
        self.ensure_owner_or_admin(&quotation.created_by)?;

        self.ctx.db.delete_quotation(&quotation.id).await?;
        info!("Deleted {}", quotation.number);
        Ok(())
    }

    pub async fn list_quotations(&self, proposal_id: &str) -> AppResult<Vec<Quotation>> {
        let proposal = self.get_proposal(proposal_id).await?;
        Ok(self.ctx.db.get_proposal_quotations(&proposal.id).await?)
    }

    pub async fn render_quotation(&self, quotation_id: &str) -> AppResult<Document> {
        let quotation = self.get_quotation(quotation_id).await?;
        Ok(documents::render(&quotation, &self.ctx.session.company))
    }

    /// Email the quotation to its client and mark a draft as sent.
    pub async fn send_quotation(&self, quotation_id: &str, mailer: &dyn Mailer) -> AppResult<DeliveryReceipt> {
        self.ensure_can_sell()?;
        let mut quotation = self.get_quotation(quotation_id).await?;

        let reply_to = Some(self.ctx.session.user.email.as_str());
        let receipt = match send_quotation(mailer, &quotation, &self.ctx.session.company, reply_to).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Sending {} failed: {}", quotation.number, e.to_safe_string());
                let notification = Notification::new(
                    &quotation.company_id,
                    self.ctx.session.user_id(),
                    "warning",
                    &format!("{} not sent", quotation.number),
                    &e.to_safe_string(),
                );
                if let Err(store_err) = self.ctx.db.add_notification(&notification).await {
                    log_error_with_context(&store_err, "Sales");
                }
                return Err(e);
            }
        };

        if quotation.status == "draft" {
            quotation.status = "sent".to_string();
            quotation.updated_at = Utc::now();
            self.ctx.db.update_quotation(&quotation).await?;
        }
        Ok(receipt)
    }
}

fn validate_proposal(proposal: &Proposal) -> AppResult<()> {
    if proposal.client_name.is_empty() {
        return Err(AppError::invalid_input("client name is required"));
    }
    if proposal.title.is_empty() {
        return Err(AppError::invalid_input("proposal title is required"));
    }
    Ok(())
}

fn validate_quotation(
    client_name: &str,
    items: &[LineItem],
    tax_rate: f64,
    discount: f64,
) -> AppResult<()> {
    if client_name.is_empty() {
        return Err(AppError::invalid_input("client name is required"));
    }
    if items.is_empty() {
        return Err(AppError::invalid_input("at least one line item is required"));
    }
    for (i, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(AppError::invalid_input(format!("line {} needs a description", i + 1)));
        }
        if item.quantity == 0 || item.months == 0 {
            return Err(AppError::invalid_input(format!("line {} needs quantity and months of at least 1", i + 1)));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(AppError::invalid_input(format!("line {} has an invalid unit price", i + 1)));
        }
    }
    if !(0.0..=1.0).contains(&tax_rate) {
        return Err(AppError::invalid_input("tax rate must be between 0 and 1"));
    }
    if !discount.is_finite() || discount < 0.0 {
        return Err(AppError::invalid_input("discount must not be negative"));
    }
    Ok(())
}
