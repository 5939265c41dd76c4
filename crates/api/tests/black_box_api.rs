use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::json;

use parish_api::app::{build_app, services::build_in_memory_services};
use parish_api::config::ApiConfig;
use parish_auth::{Permission, PermissionSet, Profile, Role};
use parish_core::{IdentityId, TenantId};
use parish_infra::InMemoryDirectory;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(profiles: Vec<Profile>) -> Self {
        let config = ApiConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");
        let directory = Arc::new(InMemoryDirectory::with_profiles(profiles));
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(build_in_memory_services(&config, directory));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn profile(tenant_id: TenantId, name: &str, role: Role) -> Profile {
    Profile {
        id: IdentityId::new(),
        tenant_id,
        email: format!("{}@example.org", name.to_lowercase()),
        display_name: name.to_string(),
        role,
        permissions: PermissionSet::defaults_for(role),
    }
}

fn mint_jwt(who: &Profile) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": who.id,
        "email": who.email,
        "iat": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(10)).timestamp(),
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// `name=value` pairs from a response's `Set-Cookie` headers.
fn cookie_pairs(res: &reqwest::Response) -> Vec<(String, String)> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|c| c.split(';').next())
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn cookie_header(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

struct Fixture {
    srv: TestServer,
    tenant: TenantId,
    owner: Profile,
    member: Profile,
    outsider: Profile,
}

async fn fixture() -> Fixture {
    let tenant = TenantId::new();
    let owner = profile(tenant, "Alice", Role::Owner);
    let member = profile(tenant, "Bob", Role::Member);
    let outsider = profile(TenantId::new(), "Carol", Role::Owner);
    let srv = TestServer::spawn(vec![owner.clone(), member.clone(), outsider.clone()]).await;
    Fixture {
        srv,
        tenant,
        owner,
        member,
        outsider,
    }
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let f = fixture().await;
    let client = reqwest::Client::new();

    for path in ["/whoami", "/identities", "/authz/explain?permission=view_reports"] {
        let res = client.get(f.srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "not_authenticated");
    }

    let res = client
        .get(f.srv.url("/whoami"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(f.srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_endpoint_is_null_when_logged_out() {
    let f = fixture().await;
    let res = reqwest::get(f.srv.url("/session")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["session"].is_null());
}

#[tokio::test]
async fn session_view_comes_from_directory_profile() {
    let f = fixture().await;
    let client = reqwest::Client::new();

    // Cookie transport and bearer transport resolve the same session.
    let token = mint_jwt(&f.member);
    let res = client
        .get(f.srv.url("/session"))
        .header(COOKIE, format!("parish_access_token={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let user = &body["session"]["user"];
    assert_eq!(user["id"], f.member.id.to_string());
    assert_eq!(user["name"], "Bob");
    assert_eq!(user["role"], "member");
    assert_eq!(user["tenantId"], f.tenant.to_string());
    assert_eq!(user["permissions"]["editRecords"], true);
    assert_eq!(user["permissions"]["manageGroups"], false);
    assert_eq!(body["session"]["impersonation"]["isImpersonating"], false);
}

#[tokio::test]
async fn unknown_identity_is_authenticated_without_tenant() {
    let f = fixture().await;
    let stranger = profile(TenantId::new(), "Stranger", Role::Owner);
    let token = mint_jwt(&stranger);
    let client = reqwest::Client::new();

    let res = client
        .get(f.srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["tenant_id"].is_null());

    let res = client
        .get(f.srv.url("/identities"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no_tenant");
}

#[tokio::test]
async fn impersonation_start_and_stop_via_cookies() {
    let f = fixture().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&f.owner);
    let mut cookies = vec![("parish_access_token".to_string(), token)];

    let res = client
        .post(f.srv.url("/impersonation"))
        .header(COOKIE, cookie_header(&cookies))
        .json(&json!({ "targetId": f.member.id.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let set = cookie_pairs(&res);
    assert_eq!(set.len(), 2);
    assert!(
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .all(|v| v.to_str().unwrap().contains("HttpOnly"))
    );
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["impersonating"]["name"], "Bob");
    cookies.extend(set);

    let res = client
        .get(f.srv.url("/session"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let session = &body["session"];
    assert_eq!(session["user"]["id"], f.member.id.to_string());
    assert_eq!(session["impersonation"]["isImpersonating"], true);
    assert_eq!(session["impersonation"]["originalIdentityId"], f.owner.id.to_string());
    assert_eq!(session["impersonation"]["impersonatedName"], "Bob");

    // Authorization runs against the impersonated member.
    let res = client
        .get(f.srv.url("/authz/explain?permission=manage_groups"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["granted"], false);
    assert_eq!(body["impersonatedBy"], f.owner.id.to_string());

    let res = client
        .get(f.srv.url("/identities"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(f.srv.url("/impersonation"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cleared = cookie_pairs(&res);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|(_, v)| v.is_empty()));
    cookies.retain(|(k, _)| k == "parish_access_token");

    let res = client
        .get(f.srv.url("/session"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["session"]["user"]["id"], f.owner.id.to_string());
    assert_eq!(body["session"]["impersonation"]["isImpersonating"], false);

    // Stopping again is a no-op success.
    let res = client
        .delete(f.srv.url("/impersonation"))
        .header(COOKIE, cookie_header(&cookies))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn stop_clears_markers_even_without_a_valid_session() {
    let f = fixture().await;
    let client = reqwest::Client::new();
    let stale = format!(
        "parish_access_token=expired; parish_impersonation_original={}; parish_impersonation_target={}",
        f.owner.id, f.member.id
    );

    let res = client
        .delete(f.srv.url("/impersonation"))
        .header(COOKIE, stale)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cleared = cookie_pairs(&res);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|(_, v)| v.is_empty()));

    // Starting still requires a session.
    let res = client
        .post(f.srv.url("/impersonation"))
        .json(&json!({ "targetId": f.member.id.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn impersonation_is_owner_only_and_tenant_scoped() {
    let f = fixture().await;
    let client = reqwest::Client::new();

    let res = client
        .post(f.srv.url("/impersonation"))
        .bearer_auth(mint_jwt(&f.owner))
        .json(&json!({ "targetId": f.outsider.id.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers().get(SET_COOKIE).is_none());

    let res = client
        .post(f.srv.url("/impersonation"))
        .bearer_auth(mint_jwt(&f.member))
        .json(&json!({ "targetId": f.owner.id.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(f.srv.url("/impersonation"))
        .bearer_auth(mint_jwt(&f.owner))
        .json(&json!({ "targetId": "not-a-uuid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forged_markers_do_not_escalate_a_member() {
    let f = fixture().await;
    let client = reqwest::Client::new();
    let cookies = format!(
        "parish_access_token={}; parish_impersonation_original={}; parish_impersonation_target={}",
        mint_jwt(&f.member),
        f.owner.id,
        f.owner.id
    );

    let res = client
        .get(f.srv.url("/session"))
        .header(COOKIE, cookies)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["session"]["user"]["id"], f.member.id.to_string());
    assert_eq!(body["session"]["impersonation"]["isImpersonating"], false);
}

#[tokio::test]
async fn identity_administration_lifecycle() {
    let f = fixture().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&f.owner);

    let res = client
        .post(f.srv.url("/identities"))
        .bearer_auth(&token)
        .json(&json!({
            "email": "Dave@Example.org",
            "displayName": "Dave",
            "role": "member",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["email"], "dave@example.org");
    assert_eq!(created["tenantId"], f.tenant.to_string());
    let dave = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(f.srv.url("/identities"))
        .bearer_auth(&token)
        .json(&json!({
            "email": "dave@example.org",
            "displayName": "Dave again",
            "role": "member",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .patch(f.srv.url(&format!("/identities/{dave}")))
        .bearer_auth(&token)
        .json(&json!({
            "permissions": PermissionSet::NONE.with(Permission::ManageGroups),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["role"], "member");
    assert_eq!(updated["permissions"]["manageGroups"], true);
    assert_eq!(updated["permissions"]["editRecords"], false);

    let res = client
        .get(f.srv.url("/identities"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let names: Vec<_> = body["identities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["displayName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Dave"]);

    let res = client
        .delete(f.srv.url(&format!("/identities/{dave}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn administrator_floor_and_self_delete_are_enforced() {
    let f = fixture().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(&f.owner);

    let res = client
        .patch(f.srv.url(&format!("/identities/{}", f.owner.id)))
        .bearer_auth(&token)
        .json(&json!({ "role": "member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "last_administrator");

    let res = client
        .delete(f.srv.url(&format!("/identities/{}", f.owner.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "self_deletion");

    // Other tenants' identities do not exist from here.
    let res = client
        .delete(f.srv.url(&format!("/identities/{}", f.outsider.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
