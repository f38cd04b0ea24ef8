use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    aud: &'a str,
    email: Option<&'a str>,
    exp: usize,
}

fn token(claims: &TestClaims<'_>, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn claims(exp: usize) -> TestClaims<'static> {
    TestClaims {
        sub: "123e4567-e89b-12d3-a456-426614174000",
        role: "authenticated",
        aud: "authenticated",
        email: Some("coach@example.com"),
        exp,
    }
}

#[test]
fn accepts_valid_token() {
    let token = token(&claims(9_999_999_999), SECRET);

    let claims = validate_access_token(&token, SECRET).expect("valid token should pass");
    assert_eq!(claims.sub, "123e4567-e89b-12d3-a456-426614174000");
    assert_eq!(claims.email.as_deref(), Some("coach@example.com"));
}

#[test]
fn rejects_expired_token() {
    let token = token(&claims(1), SECRET);

    assert!(validate_access_token(&token, SECRET).is_err());
}

#[test]
fn rejects_token_signed_with_another_secret() {
    let token = token(&claims(9_999_999_999), "wrongsecret");

    assert!(validate_access_token(&token, SECRET).is_err());
}

#[test]
fn rejects_unexpected_audience() {
    let mut claims = claims(9_999_999_999);
    claims.aud = "anon";
    let token = token(&claims, SECRET);

    assert!(validate_access_token(&token, SECRET).is_err());
}
