mod common;

use std::time::Duration;

use anyhow::Result;
use bankbook::application::{AppError, CardBrand, CardType};
use bankbook::config::BankConfig;
use bankbook::domain::{
    AccountStatus, AccountSubtype, AccountType, CompanyDraft, CreateAccountRequest, Currency,
};
use common::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_personal_account_gets_opening_defaults() -> Result<()> {
    let mut bank = TestBank::new().await?;

    let account = bank.open_personal(ANA_ID).await?;

    assert_eq!(account.owner_id, ANA_ID);
    assert_eq!(account.employee_id, STAFF_ID);
    assert_eq!(account.balance, 0);
    assert_eq!(account.daily_limit, 0);
    assert_eq!(account.monthly_limit, 0);
    assert_eq!(account.reserved_balance, 10_000);
    assert_eq!(account.daily_spent, 0);
    assert_eq!(account.monthly_spent, 0);
    assert_eq!(account.monthly_maintenance_fee, 0);
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.company_id, None);
    assert_eq!(account.expiration_date - account.created_date, 126_144_000);

    // No card unless asked for
    assert!(bank.cards.requests().is_empty());

    let stored = bank.service.get_account(account.id).await?;
    assert_eq!(stored, account);

    let notification = bank.next_notification().await?;
    assert_eq!(notification.email, "ana@example.com");
    assert_eq!(notification.subject, "Account successfully created");
    assert_eq!(notification.message, "Your account has been successfully created");
    assert_eq!(notification.kind, "email");

    Ok(())
}

#[tokio::test]
async fn test_account_number_layout() -> Result<()> {
    let bank = TestBank::new().await?;

    let current = bank.open_personal(ANA_ID).await?;
    let foreign = bank
        .service
        .create_account(
            CreateAccountRequest::new(
                ANA_ID,
                AccountType::ForeignCurrency,
                AccountSubtype::Savings,
                Currency::Eur,
            ),
            Some(STAFF_ID),
        )
        .await?;

    for account in [&current, &foreign] {
        let number = &account.account_number;
        assert_eq!(number.len(), 18);
        assert!(number.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&number[0..3], "111");
        assert_eq!(&number[3..7], "0001");
    }
    assert_eq!(&current.account_number[16..], "11");
    assert_eq!(&foreign.account_number[16..], "23");

    let by_number = bank
        .service
        .get_account_by_number(&foreign.account_number)
        .await?;
    assert_eq!(by_number.id, foreign.id);

    Ok(())
}

#[tokio::test]
async fn test_supplied_money_fields_are_kept() -> Result<()> {
    let bank = TestBank::new().await?;

    let request = personal_request(ANA_ID)
        .with_balance(50_000)
        .with_limits(2_000, 30_000)
        .with_status(AccountStatus::Inactive);
    let account = bank.service.create_account(request, Some(STAFF_ID)).await?;

    assert_eq!(account.balance, 50_000);
    assert_eq!(account.daily_limit, 2_000);
    assert_eq!(account.monthly_limit, 30_000);
    assert_eq!(account.status, AccountStatus::Inactive);
    assert_eq!(account.reserved_balance, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_type_and_currency_must_agree() -> Result<()> {
    let bank = TestBank::new().await?;
    let before = bank.service.list_accounts().await?.len();

    let current_in_euro = CreateAccountRequest::new(
        ANA_ID,
        AccountType::Current,
        AccountSubtype::Personal,
        Currency::Eur,
    );
    let err = bank
        .service
        .create_account(current_in_euro, Some(STAFF_ID))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidCombination {
            account_type: AccountType::Current,
            currency: Currency::Eur
        }
    ));

    let foreign_in_dinars = CreateAccountRequest::new(
        ANA_ID,
        AccountType::ForeignCurrency,
        AccountSubtype::Personal,
        Currency::Rsd,
    );
    let err = bank
        .service
        .create_account(foreign_in_dinars, Some(STAFF_ID))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCombination { .. }));

    assert_eq!(bank.service.list_accounts().await?.len(), before);
    Ok(())
}

#[tokio::test]
async fn test_local_currency_comes_from_config() -> Result<()> {
    let bank = TestBank::build(
        BankConfig::default().with_local_currency(Currency::Eur),
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::default(),
    )
    .await?;

    let request = CreateAccountRequest::new(
        ANA_ID,
        AccountType::Current,
        AccountSubtype::Personal,
        Currency::Eur,
    );
    let account = bank.service.create_account(request, Some(STAFF_ID)).await?;
    assert_eq!(account.currency, Currency::Eur);

    let err = bank.open_personal(ANA_ID).await.unwrap_err();
    assert!(err.to_string().contains("Invalid combination"));

    Ok(())
}

#[tokio::test]
async fn test_staff_identity_is_required() -> Result<()> {
    let bank = TestBank::new().await?;

    let err = bank
        .service
        .create_account(personal_request(ANA_ID), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert!(bank.service.list_accounts_by_owner(ANA_ID).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_owner_is_rejected() -> Result<()> {
    let bank = TestBank::new().await?;

    let err = bank
        .service
        .create_account(personal_request(999), Some(STAFF_ID))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CustomerNotFound(999)));
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_negative_amounts_are_rejected() -> Result<()> {
    let bank = TestBank::new().await?;

    let err = bank
        .service
        .create_account(personal_request(ANA_ID).with_balance(-1), Some(STAFF_ID))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = bank
        .service
        .create_account(personal_request(ANA_ID).with_limits(100, -100), Some(STAFF_ID))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(ref m) if m.contains("monthly limit")));

    assert!(bank.service.list_accounts_by_owner(ANA_ID).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_slow_directory_fails_creation() -> Result<()> {
    let mut config = BankConfig::default();
    config.lookup_timeout_ms = 20;
    let bank = TestBank::build(
        config,
        InMemoryDirectory::with_standard_customers().slow(Duration::from_millis(500)),
        RecordingCardIssuer::default(),
    )
    .await?;

    let err = bank
        .service
        .create_account(personal_request(ANA_ID), Some(STAFF_ID))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CollaboratorUnavailable(_)));
    assert!(!err.is_client_error());
    assert!(bank.service.list_accounts_by_owner(ANA_ID).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_card_requested_on_opening() -> Result<()> {
    let bank = TestBank::new().await?;

    let account = bank
        .service
        .create_account(personal_request(ANA_ID).with_card(), Some(STAFF_ID))
        .await?;

    let requests = bank.cards.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].account_id, account.id);
    assert_eq!(requests[0].brand, CardBrand::Visa);
    assert_eq!(requests[0].card_type, CardType::Credit);
    assert_eq!(requests[0].authorized_person, None);
    Ok(())
}

#[tokio::test]
async fn test_card_failure_does_not_fail_creation() -> Result<()> {
    let mut bank = TestBank::build(
        BankConfig::default(),
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::failing(),
    )
    .await?;

    let account = bank
        .service
        .create_account(personal_request(ANA_ID).with_card(), Some(STAFF_ID))
        .await?;

    assert_eq!(bank.cards.requests().len(), 1);
    assert_eq!(bank.service.get_account(account.id).await?.id, account.id);
    // The notification still goes out
    assert_eq!(bank.next_notification().await?.email, "ana@example.com");
    Ok(())
}

#[tokio::test]
async fn test_seeded_generators_agree() -> Result<()> {
    let first = TestBank::new().await?;
    let second = TestBank::new().await?;

    let a = first.open_personal(ANA_ID).await?;
    let b = second.open_personal(ANA_ID).await?;

    assert_eq!(a.account_number, b.account_number);
    Ok(())
}

#[tokio::test]
async fn test_taken_number_is_redrawn() -> Result<()> {
    let first = TestBank::new().await?;
    let taken = first.open_personal(ANA_ID).await?;

    // Same seed over the same storage: the first draw collides
    let second = TestBank::build_on(
        first.service.repository().clone(),
        BankConfig::default(),
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::default(),
        TempDir::new()?,
    )
    .await?;
    let fresh = second.open_personal(MARKO_ID).await?;

    assert_ne!(fresh.account_number, taken.account_number);
    assert_eq!(second.service.list_accounts_by_owner(MARKO_ID).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_number_exhaustion_is_reported() -> Result<()> {
    let first = TestBank::new().await?;
    first.open_personal(ANA_ID).await?;

    let mut config = BankConfig::default();
    config.account_number_attempts = 1;
    let second = TestBank::build_on(
        first.service.repository().clone(),
        config,
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::default(),
        TempDir::new()?,
    )
    .await?;

    let err = second
        .service
        .create_account(personal_request(MARKO_ID), Some(STAFF_ID))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccountNumberExhausted(1)));
    assert!(second.service.list_accounts_by_owner(MARKO_ID).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_exhaustion_leaves_no_new_company_behind() -> Result<()> {
    let first = TestBank::new().await?;
    first
        .service
        .create_account(business_request(ANA_ID), Some(STAFF_ID))
        .await?;

    let mut config = BankConfig::default();
    config.account_number_attempts = 1;
    let second = TestBank::build_on(
        first.service.repository().clone(),
        config,
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::default(),
        TempDir::new()?,
    )
    .await?;

    let request =
        business_request(MARKO_ID).with_company(CompanyDraft::new("20123456", "Acme d.o.o."));
    let err = second
        .service
        .create_account(request, Some(STAFF_ID))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccountNumberExhausted(1)));
    assert!(second.service.list_accounts_by_owner(MARKO_ID).await?.is_empty());
    assert!(second.service.list_companies().await?.is_empty());
    let err = second
        .service
        .find_company_by_number("20123456")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CompanyNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_exhaustion_keeps_existing_company() -> Result<()> {
    let first = TestBank::new().await?;
    first
        .service
        .create_account(business_request(MARKO_ID), Some(STAFF_ID))
        .await?;
    let company = first
        .service
        .create_company(CompanyDraft::new("20123456", "Acme d.o.o."), Some(MARKO_ID))
        .await?;

    let mut config = BankConfig::default();
    config.account_number_attempts = 1;
    let second = TestBank::build_on(
        first.service.repository().clone(),
        config,
        InMemoryDirectory::with_standard_customers(),
        RecordingCardIssuer::default(),
        TempDir::new()?,
    )
    .await?;

    let err = second
        .service
        .create_account(
            business_request(MARKO_ID).with_company(CompanyDraft::new("20123456", "")),
            Some(STAFF_ID),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccountNumberExhausted(1)));
    assert_eq!(second.service.find_company_by_number("20123456").await?, company);
    Ok(())
}

#[tokio::test]
async fn test_listing_accounts() -> Result<()> {
    let bank = TestBank::new().await?;

    bank.open_personal(ANA_ID).await?;
    bank.open_personal(ANA_ID).await?;
    bank.open_personal(MARKO_ID).await?;

    assert_eq!(bank.service.list_accounts_by_owner(ANA_ID).await?.len(), 2);
    assert_eq!(bank.service.list_accounts_by_owner(MARKO_ID).await?.len(), 1);
    // Three customer accounts plus the clearing account
    assert_eq!(bank.service.list_accounts().await?.len(), 4);
    Ok(())
}
