//! OTP flow tests against a live database.
//!
//! Each test skips (and passes) when `TEST_DATABASE_URL` is unset.

#![allow(clippy::unwrap_used)]

use copper_kettle_core::OtpId;
use copper_kettle_integration_tests::TestContext;
use copper_kettle_storefront::db::otps::OtpRepository;
use copper_kettle_storefront::services::OtpService;
use copper_kettle_storefront::services::otp::OtpError;

fn service<'a>(ctx: &'a TestContext) -> OtpService<'a> {
    OtpService::new(&ctx.pool, &ctx.notifier, "91")
}

async fn stored_code(ctx: &TestContext, id: OtpId) -> String {
    OtpRepository::new(&ctx.pool)
        .get(id)
        .await
        .unwrap()
        .expect("otp row exists")
        .code
}

#[tokio::test]
async fn correct_code_verifies_exactly_once() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let user = ctx.create_user().await;
    let phone = ctx.phone_of(&user).await;

    let otps = service(&ctx);
    let issued = otps.request_login(phone.as_str()).await.unwrap();
    let code = stored_code(&ctx, issued.id).await;

    // Wrong code first: costs an attempt, reports the remaining budget
    let wrong = otps.verify(issued.id, "000000").await;
    match wrong {
        Err(OtpError::InvalidCode { remaining }) => assert_eq!(remaining, 4),
        // The random code could actually be 000000; accept success then
        Ok(_) => assert_eq!(code, "000000"),
        Err(e) => panic!("unexpected error: {e}"),
    }

    if code != "000000" {
        let verified = otps.verify(issued.id, &code).await.unwrap();
        assert_eq!(verified.user_id, Some(user.id));
    }

    // Any further call on the same row fails as already used
    let replay = otps.verify(issued.id, &code).await;
    assert!(matches!(replay, Err(OtpError::AlreadyUsed)));
}

#[tokio::test]
async fn sixth_attempt_fails_even_with_correct_code() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let user = ctx.create_user().await;
    let phone = ctx.phone_of(&user).await;

    let otps = service(&ctx);
    let issued = otps.request_login(phone.as_str()).await.unwrap();
    let code = stored_code(&ctx, issued.id).await;
    let wrong = if code == "999999" { "999998" } else { "999999" };

    for expected_remaining in (0..5).rev() {
        let result = otps.verify(issued.id, wrong).await;
        match result {
            Err(OtpError::InvalidCode { remaining }) => {
                assert_eq!(remaining, expected_remaining);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    let sixth = otps.verify(issued.id, &code).await;
    assert!(matches!(sixth, Err(OtpError::TooManyAttempts)));
}

#[tokio::test]
async fn issuing_replaces_prior_codes_for_the_phone() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let user = ctx.create_user().await;
    let phone = ctx.phone_of(&user).await;

    let otps = service(&ctx);
    let first = otps.request_login(phone.as_str()).await.unwrap();
    let second = otps.request_login(phone.as_str()).await.unwrap();
    assert_ne!(first.id, second.id);

    // The first row is gone; only the fresh code can verify
    let stale = OtpRepository::new(&ctx.pool).get(first.id).await.unwrap();
    assert!(stale.is_none());

    let code = stored_code(&ctx, second.id).await;
    let verified = otps.verify(second.id, &code).await.unwrap();
    assert_eq!(verified.user_id, Some(user.id));
}

#[tokio::test]
async fn unregistered_numbers_cannot_request_login_codes() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let result = service(&ctx).request_login("9000000001").await;
    assert!(matches!(result, Err(OtpError::PhoneNotRegistered)));
}
