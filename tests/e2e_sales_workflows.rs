use oohplanner::config::AppConfig;
use oohplanner::documents::SectionBody;
use oohplanner::{
    AppContext, Company, Database, LineItem, NewQuotation, PageRequest, ProposalFilter, ProposalStatus,
    QuotationKind, Role, SalesService, Session, Subscription, User,
};
use std::sync::Arc;
use tempfile::NamedTempFile;

async fn sales_context() -> AppContext {
    let temp_file = NamedTempFile::new().unwrap();
    let (_, path) = temp_file.keep().unwrap();
    let db = Arc::new(
        Database::connect(&format!("sqlite:{}", path.to_str().unwrap()))
            .await
            .unwrap(),
    );

    let mut company = Company::new("Skyline Outdoor");
    company.email = Some("sales@skyline.example".to_string());
    db.add_company(&company).await.unwrap();
    db.save_subscription(&Subscription::new(&company.id, "business", 25))
        .await
        .unwrap();

    let user = User::new(&company.id, "ana@skyline.example", "Ana", Role::Sales);
    db.add_user(&user).await.unwrap();
    let session = Session::load(&db, &user.id).await.unwrap();
    AppContext::new(db, session, Arc::new(AppConfig::default()))
}

#[tokio::test]
async fn test_proposal_to_cost_estimate_workflow() {
    let sales = SalesService::new(sales_context().await);

    // 1. Draft a proposal and send it
    let proposal = sales
        .create_proposal(
            "Acme Beverages",
            "Summer EDSA takeover",
            vec!["EDSA-NB-01".to_string(), "EDSA-SB-04".to_string()],
        )
        .await
        .unwrap();
    sales
        .set_proposal_status(&proposal.id, ProposalStatus::Sent)
        .await
        .unwrap();

    // 2. Two estimates against it, numbered in sequence
    let new = NewQuotation {
        kind: QuotationKind::CostEstimate,
        proposal_id: Some(proposal.id.clone()),
        client_name: "Acme Beverages".to_string(),
        client_email: Some("media@acme.example".to_string()),
        items: vec![
            LineItem::new("Billboard rental", 2, 95_000.0, 3),
            LineItem::new("Tarpaulin print", 2, 18_500.0, 1),
        ],
        tax_rate: 0.12,
        discount: 20_000.0,
        notes: Some("Rates exclude LGU permits.".to_string()),
        valid_until: None,
    };
    let first = sales.create_quotation(new.clone()).await.unwrap();
    let second = sales
        .create_quotation(NewQuotation {
            discount: 0.0,
            ..new.clone()
        })
        .await
        .unwrap();

    assert!(first.number.starts_with("CE-"));
    assert!(first.number.ends_with("-0001"));
    assert!(second.number.ends_with("-0002"));

    // 570,000 + 37,000 = 607,000; less 20,000 = 587,000; VAT 70,440
    let totals = first.totals();
    assert_eq!(totals.subtotal, 607_000.0);
    assert_eq!(totals.taxable, 587_000.0);
    assert_eq!(totals.tax, 70_440.0);
    assert_eq!(totals.total, 657_440.0);

    // 3. Rendered document carries the optional sections
    let doc = sales.render_quotation(&first.id).await.unwrap();
    assert!(doc.section("Notes").is_some());
    let Some(SectionBody::Summary(summary)) = doc.section("Totals").map(|s| &s.body) else {
        panic!("missing totals");
    };
    assert!(summary.iter().any(|(label, amount)| label == "Discount" && amount == "-20,000.00"));
    assert!(doc.to_text().contains("657,440.00"));

    let second_doc = sales.render_quotation(&second.id).await.unwrap();
    assert!(second_doc.to_text().lines().all(|l| !l.starts_with("Discount:")));

    // 4. Search finds the proposal by client
    let filter = ProposalFilter {
        text: Some("acme".to_string()),
        status: Some(ProposalStatus::Sent),
        ..ProposalFilter::default()
    };
    let page = sales.search_proposals(&filter, PageRequest::first(10)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(sales.list_quotations(&proposal.id).await.unwrap().len(), 2);

    // 5. Withdrawing the first estimate leaves a gap; numbering carries on
    sales.delete_quotation(&first.id).await.unwrap();
    let third = sales.create_quotation(new).await.unwrap();
    assert!(third.number.ends_with("-0003"));
    assert_eq!(sales.list_quotations(&proposal.id).await.unwrap().len(), 2);
}
