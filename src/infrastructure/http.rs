use super::session::Session;
use crate::config::{AuthScheme, ClientConfig};
use crate::domain::admin::{DashboardStats, EnrollmentFilter, StatusUpdate};
use crate::domain::coupon::{CouponRequest, CouponValidation};
use crate::domain::enrollment::{
    Enrollment, EnrollmentId, EnrollmentStatus, EnrollmentUpdate, NewEnrollment,
};
use crate::domain::payment::{NewPayment, Payment};
use crate::domain::ports::{AccountApi, AdminApi, EnrollmentApi};
use crate::domain::product::{Batch, BatchDraft, BatchId, Product, ProductDraft, ProductId};
use crate::domain::user::{
    AuthResponse, Credentials, PasswordChange, PasswordResetConfirm, Registration, User,
};
use crate::error::{EnrollError, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

/// List endpoints answer either with a DRF page or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Page { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Plain(items) => items,
        }
    }
}

/// REST adapter for the camp backend.
///
/// Implements every port the application layer talks to. Requests carry
/// the session token and, when mutating, the CSRF cookie mirrored into a
/// header.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    jar: Arc<Jar>,
    base: Url,
    api_url: String,
    auth_scheme: AuthScheme,
    session: Session,
}

impl HttpApi {
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.api_url)
            .map_err(|e| EnrollError::Validation(format!("invalid api url: {e}")))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            jar,
            base,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_scheme: config.auth_scheme,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying client, shared with the card gateway tokenizer.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == CSRF_COOKIE).then(|| value.to_string())
        })
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "api request");

        let mutating = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.session.token().await {
            builder = builder.header(
                reqwest::header::AUTHORIZATION,
                self.auth_scheme.header_value(&token),
            );
        }
        if mutating && let Some(csrf) = self.csrf_token() {
            builder = builder.header(CSRF_HEADER, csrf);
        }
        builder
    }

    /// Sends the request and returns the body of a successful response.
    async fn execute(&self, builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "api request rejected");
            return Err(EnrollError::from_response(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned + Send>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.execute(builder).await?;
        serde_json::from_str(&body).map_err(|e| EnrollError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T> {
        self.fetch(self.request(Method::GET, path).await).await
    }

    async fn list<T: DeserializeOwned + Send>(&self, path: &str) -> Result<Vec<T>> {
        self.get::<Listing<T>>(path).await.map(Listing::into_vec)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        self.fetch(self.request(method, path).await.json(body)).await
    }

    async fn send_ignoring_body<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: serde::Serialize + ?Sized + Sync,
    {
        let mut builder = self.request(method, path).await;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(builder).await.map(|_| ())
    }
}

#[async_trait]
impl EnrollmentApi for HttpApi {
    async fn list_products(&self) -> Result<Vec<Product>> {
        self.list("/products/products/").await
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.get(&format!("/products/products/{id}/")).await
    }

    async fn create_enrollment(&self, enrollment: &NewEnrollment) -> Result<Enrollment> {
        self.send_json(Method::POST, "/enrollments/", enrollment).await
    }

    async fn list_enrollments(&self) -> Result<Vec<Enrollment>> {
        self.list("/enrollments/").await
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Enrollment> {
        self.get(&format!("/enrollments/{id}/")).await
    }

    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        update: &EnrollmentUpdate,
    ) -> Result<Enrollment> {
        self.send_json(Method::PATCH, &format!("/enrollments/{id}/"), update)
            .await
    }

    async fn validate_coupon(&self, request: &CouponRequest) -> Result<CouponValidation> {
        self.send_json(Method::POST, "/enrollments/validate-coupon/", request)
            .await
    }

    async fn create_payment(&self, payment: &NewPayment) -> Result<Payment> {
        self.send_json(Method::POST, "/payments/", payment).await
    }
}

#[async_trait]
impl AccountApi for HttpApi {
    async fn register(&self, registration: &Registration) -> Result<AuthResponse> {
        self.send_json(Method::POST, "/users/register/", registration)
            .await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.send_json(Method::POST, "/users/login/", credentials)
            .await
    }

    async fn logout(&self) -> Result<()> {
        self.send_ignoring_body::<()>(Method::POST, "/users/logout/", None)
            .await
    }

    async fn profile(&self) -> Result<User> {
        self.get("/users/profile/").await
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        self.send_ignoring_body(Method::POST, "/users/change-password/", Some(change))
            .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.send_ignoring_body(
            Method::POST,
            "/users/password-reset/",
            Some(&json!({ "email": email })),
        )
        .await
    }

    async fn confirm_password_reset(&self, confirm: &PasswordResetConfirm) -> Result<()> {
        self.send_ignoring_body(Method::POST, "/users/password-reset-confirm/", Some(confirm))
            .await
    }
}

#[async_trait]
impl AdminApi for HttpApi {
    async fn dashboard(&self) -> Result<DashboardStats> {
        self.get("/users/admin/dashboard/").await
    }

    async fn search_enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<Enrollment>> {
        let builder = self
            .request(Method::GET, "/users/admin/enrollments/")
            .await
            .query(&filter.query_pairs());
        self.fetch::<Listing<Enrollment>>(builder)
            .await
            .map(Listing::into_vec)
    }

    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment> {
        self.send_json(
            Method::PATCH,
            &format!("/users/admin/enrollments/{id}/"),
            &StatusUpdate { status },
        )
        .await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.list("/users/admin/products/").await
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product> {
        self.send_json(Method::POST, "/users/admin/products/create/", draft)
            .await
    }

    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> Result<Product> {
        self.send_json(Method::PATCH, &format!("/users/admin/products/{id}/"), draft)
            .await
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.send_ignoring_body::<()>(
            Method::DELETE,
            &format!("/users/admin/products/{id}/delete/"),
            None,
        )
        .await
    }

    async fn create_batch(&self, draft: &BatchDraft) -> Result<Batch> {
        self.send_json(Method::POST, "/users/admin/batches/create/", draft)
            .await
    }

    async fn update_batch(&self, id: BatchId, draft: &BatchDraft) -> Result<Batch> {
        self.send_json(Method::PATCH, &format!("/users/admin/batches/{id}/"), draft)
            .await
    }

    async fn delete_batch(&self, id: BatchId) -> Result<()> {
        self.send_ignoring_body::<()>(
            Method::DELETE,
            &format!("/users/admin/batches/{id}/delete/"),
            None,
        )
        .await
    }
}
