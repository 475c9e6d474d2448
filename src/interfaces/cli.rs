use crate::application::account::AccountService;
use crate::application::admin::AdminConsole;
use crate::application::coupon::CouponForm;
use crate::application::enrollment_form::{EnrollmentForm, FormStep};
use crate::application::payment_flow::{PaymentFlowController, WatchOutcome};
use crate::config::{AuthScheme, ClientConfig, DEFAULT_API_URL, TokenizerConfig};
use crate::domain::admin::EnrollmentFilter;
use crate::domain::age_gate::AgePolicy;
use crate::domain::enrollment::{
    Enrollment, EnrollmentId, EnrollmentStatus, PersonalData, active_enrollment,
};
use crate::domain::money::Money;
use crate::domain::payment::{CreditCardData, Payment, PaymentId, PaymentMethod};
use crate::domain::ports::{AccountApiRef, AdminApiRef, CardTokenizerRef, EnrollmentApiRef};
use crate::domain::product::{BatchDraft, BatchId, Product, ProductDraft, ProductId, format_countdown};
use crate::domain::user::{Credentials, PasswordChange, PasswordResetConfirm, Registration};
use crate::error::{EnrollError, Result};
use crate::infrastructure::http::HttpApi;
use crate::infrastructure::session::Session;
use crate::infrastructure::{card_tokenizer, session_store};
use crate::interfaces::csv::enrollment_writer::EnrollmentWriter;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::fs::File;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Camp enrollment client", long_about = None)]
pub struct Cli {
    /// Base URL of the enrollment API
    #[arg(long, env = "CAMP_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Keep the login token in this file between runs
    #[arg(long, env = "CAMP_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Authorization header scheme: bearer or token
    #[arg(long, env = "CAMP_AUTH_SCHEME", default_value = "bearer", global = true)]
    pub auth_scheme: AuthScheme,

    /// Seconds between payment status checks
    #[arg(long, env = "CAMP_POLL_INTERVAL_SECS", default_value_t = 3, global = true)]
    pub poll_interval_secs: u64,

    /// Age requirement: min-age:<years> or born-before:<year>
    #[arg(long, env = "CAMP_AGE_POLICY", default_value = "min-age:17", global = true)]
    pub age_policy: AgePolicy,

    /// Tokenize cards with the gateway at this URL instead of on the backend
    #[arg(long, env = "CAMP_CARD_GATEWAY_URL", requires = "card_gateway_key", global = true)]
    pub card_gateway_url: Option<String>,

    /// Public key for the card gateway
    #[arg(long, env = "CAMP_CARD_GATEWAY_KEY", global = true)]
    pub card_gateway_key: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config(&self) -> ClientConfig {
        let tokenizer = match (&self.card_gateway_url, &self.card_gateway_key) {
            (Some(url), Some(public_key)) => TokenizerConfig::Gateway {
                url: url.clone(),
                public_key: public_key.clone(),
            },
            _ => TokenizerConfig::ServerSide,
        };
        ClientConfig {
            api_url: self.api_url.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            auth_scheme: self.auth_scheme,
            age_policy: self.age_policy,
            session_file: self.session_file.clone(),
            tokenizer,
            ..ClientConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CAMP_PASSWORD")]
        password: String,
        /// Password confirmation
        #[arg(long)]
        password2: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        cpf: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CAMP_PASSWORD")]
        password: String,
    },
    Logout,
    Profile,
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        new_password2: String,
    },
    /// Ask for a password reset email
    ResetPassword { email: String },
    /// Set a new password with the uid and token from the reset email
    ConfirmReset {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        new_password: String,
    },
    /// List products open for enrollment
    Products,
    Product { id: ProductId },
    /// Check a coupon against a product's current price
    Coupon {
        #[arg(long)]
        product: ProductId,
        code: String,
    },
    /// Enroll in a product
    Enroll {
        #[arg(long)]
        product: ProductId,
        /// Personal data as JSON, or @path to a JSON file
        #[arg(long)]
        form: String,
        #[arg(long)]
        coupon: Option<String>,
    },
    /// List your enrollments
    Enrollments,
    /// Show the payment options of an enrollment
    Plans { enrollment: EnrollmentId },
    /// Create the payment for an enrollment
    Pay {
        enrollment: EnrollmentId,
        /// pix-cash, pix-installment or credit-card
        #[arg(long)]
        method: PaymentMethod,
        #[arg(long, default_value_t = 1)]
        installments: u8,
        #[command(flatten)]
        card: CardArgs,
        /// Keep polling until the payment is confirmed
        #[arg(long)]
        watch: bool,
    },
    /// Show the payments of an enrollment
    Status {
        enrollment: EnrollmentId,
        #[arg(long)]
        payment: Option<PaymentId>,
    },
    /// Poll until a payment is confirmed (Ctrl-C stops)
    Watch {
        enrollment: EnrollmentId,
        #[arg(long)]
        payment: Option<PaymentId>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args, Debug, Default)]
pub struct CardArgs {
    #[arg(long)]
    pub card_number: Option<String>,
    #[arg(long)]
    pub card_holder: Option<String>,
    #[arg(long)]
    pub card_expiry_month: Option<String>,
    #[arg(long)]
    pub card_expiry_year: Option<String>,
    #[arg(long)]
    pub card_ccv: Option<String>,
}

impl CardArgs {
    fn card(&self) -> Option<CreditCardData> {
        Some(CreditCardData {
            number: self.card_number.clone()?,
            holder_name: self.card_holder.clone()?,
            expiry_month: self.card_expiry_month.clone()?,
            expiry_year: self.card_expiry_year.clone()?,
            ccv: self.card_ccv.clone()?,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Dashboard totals
    Stats,
    Enrollments {
        #[arg(long)]
        status: Option<EnrollmentStatus>,
        #[arg(long)]
        product: Option<ProductId>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        payment_method: Option<PaymentMethod>,
        /// Write CSV to this path, or - for stdout
        #[arg(long)]
        csv: Option<String>,
    },
    SetStatus {
        id: EnrollmentId,
        status: EnrollmentStatus,
    },
    Products,
    CreateProduct(ProductFields),
    UpdateProduct {
        id: ProductId,
        #[command(flatten)]
        fields: ProductFields,
    },
    DeleteProduct { id: ProductId },
    CreateBatch(BatchFields),
    UpdateBatch {
        id: BatchId,
        #[command(flatten)]
        fields: BatchFields,
    },
    DeleteBatch { id: BatchId },
}

#[derive(Args, Debug)]
pub struct ProductFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub base_price: Option<Decimal>,
    #[arg(long)]
    pub max_installments: Option<u8>,
    #[arg(long)]
    pub active: Option<bool>,
    #[arg(long)]
    pub event_date: Option<String>,
}

impl From<ProductFields> for ProductDraft {
    fn from(fields: ProductFields) -> Self {
        ProductDraft {
            name: fields.name,
            description: fields.description,
            base_price: fields.base_price.map(Money::new),
            max_installments: fields.max_installments,
            is_active: fields.active,
            event_date: fields.event_date,
        }
    }
}

#[derive(Args, Debug)]
pub struct BatchFields {
    #[arg(long)]
    pub product: Option<ProductId>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    /// PIX cash price
    #[arg(long)]
    pub price: Option<Decimal>,
    #[arg(long)]
    pub pix_installment_price: Option<Decimal>,
    #[arg(long)]
    pub credit_card_price: Option<Decimal>,
    #[arg(long)]
    pub max_enrollments: Option<u32>,
}

impl From<BatchFields> for BatchDraft {
    fn from(fields: BatchFields) -> Self {
        BatchDraft {
            product: fields.product,
            name: fields.name,
            start_date: fields.start_date,
            end_date: fields.end_date,
            price: fields.price.map(Money::new),
            pix_installment_price: fields.pix_installment_price.map(Money::new),
            credit_card_price: fields.credit_card_price.map(Money::new),
            max_enrollments: fields.max_enrollments,
        }
    }
}

/// Wired-up services for one invocation.
struct App {
    config: ClientConfig,
    session: Session,
    enrollments: EnrollmentApiRef,
    accounts: AccountApiRef,
    admin: AdminApiRef,
    tokenizer: CardTokenizerRef,
}

impl App {
    async fn connect(config: ClientConfig) -> Result<Self> {
        let session = Session::restore(session_store(&config)).await?;
        let api = Arc::new(HttpApi::new(&config, session.clone())?);
        let tokenizer = card_tokenizer(&config, api.client());
        Ok(Self {
            config,
            session,
            enrollments: api.clone(),
            accounts: api.clone(),
            admin: api,
            tokenizer,
        })
    }

    fn accounts(&self) -> AccountService {
        AccountService::new(self.accounts.clone(), self.session.clone())
    }

    fn admin_console(&self) -> AdminConsole {
        AdminConsole::new(self.admin.clone(), self.session.clone())
    }

    fn payment_flow(&self, enrollment: EnrollmentId) -> PaymentFlowController {
        PaymentFlowController::new(self.enrollments.clone(), self.tokenizer.clone(), enrollment)
            .with_poll_interval(self.config.poll_interval)
    }

    async fn require_login(&self) -> Result<()> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(EnrollError::NotAuthenticated)
        }
    }
}

/// Runs one command. `shutdown` completes on Ctrl-C and stops any polling.
pub async fn run<F>(cli: Cli, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let app = App::connect(cli.config()).await?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Register {
            email,
            password,
            password2,
            first_name,
            last_name,
            phone,
            cpf,
        } => {
            let user = app
                .accounts()
                .register(&Registration {
                    email,
                    password,
                    password2,
                    first_name,
                    last_name,
                    phone,
                    cpf,
                })
                .await?;
            writeln!(out, "Conta criada. Bem-vindo(a), {}!", user.display_name())?;
        }
        Command::Login { email, password } => {
            let user = app.accounts().login(&Credentials { email, password }).await?;
            writeln!(out, "Logado como {}", user.display_name())?;
            if user.is_admin() {
                writeln!(out, "Acesso administrativo disponível: camp-enroll admin")?;
            }
        }
        Command::Logout => {
            app.accounts().logout().await?;
            writeln!(out, "Sessão encerrada")?;
        }
        Command::Profile => {
            let user = app.accounts().profile().await?;
            writeln!(out, "Nome:  {}", user.display_name())?;
            writeln!(out, "Email: {}", user.email)?;
            if let Some(profile) = &user.profile {
                writeln!(out, "Telefone: {}", profile.phone)?;
                writeln!(out, "CPF: {}", profile.cpf)?;
            }
        }
        Command::ChangePassword {
            old_password,
            new_password,
            new_password2,
        } => {
            app.require_login().await?;
            app.accounts()
                .change_password(&PasswordChange {
                    old_password,
                    new_password,
                    new_password2,
                })
                .await?;
            writeln!(out, "Senha alterada")?;
        }
        Command::ResetPassword { email } => {
            app.accounts().request_password_reset(&email).await?;
            writeln!(out, "Se o email estiver cadastrado, você receberá as instruções.")?;
        }
        Command::ConfirmReset {
            uid,
            token,
            new_password,
        } => {
            app.accounts()
                .confirm_password_reset(&PasswordResetConfirm {
                    uid,
                    token,
                    new_password,
                })
                .await?;
            writeln!(out, "Senha redefinida")?;
        }
        Command::Products => {
            for product in app.enrollments.list_products().await? {
                print_product_line(&mut out, &product)?;
            }
        }
        Command::Product { id } => {
            let product = app.enrollments.get_product(id).await?;
            print_product(&mut out, &product)?;
        }
        Command::Coupon { product, code } => {
            let product = app.enrollments.get_product(product).await?;
            let mut coupon = CouponForm::new(app.enrollments.clone());
            let discount = coupon.apply(&code, Some(&product)).await?;
            writeln!(out, "Cupom aplicado! Desconto: {discount}")?;
            if let Some(batch) = &product.active_batch {
                writeln!(out, "Total: {}", coupon.total(batch.price))?;
            }
        }
        Command::Enroll {
            product,
            form,
            coupon,
        } => {
            app.require_login().await?;
            let data = read_form(&form)?;
            let mut enrollment_form =
                EnrollmentForm::load(app.enrollments.clone(), app.config.age_policy, product)
                    .await?;
            enrollment_form.set_data(data);
            if let Some(code) = coupon {
                let discount = enrollment_form.apply_coupon(&code).await?;
                writeln!(out, "Cupom aplicado! Desconto: {discount}")?;
            }
            let enrollment = enrollment_form.submit().await?;
            writeln!(
                out,
                "Inscrição {} criada ({}). Valor: {}",
                enrollment.id,
                enrollment.status.label(),
                enrollment.final_amount
            )?;
            writeln!(
                out,
                "Próximo passo: camp-enroll plans {} / camp-enroll pay {} --method pix-cash",
                enrollment.id, enrollment.id
            )?;
        }
        Command::Enrollments => {
            app.require_login().await?;
            let enrollments = app.enrollments.list_enrollments().await?;
            for enrollment in &enrollments {
                print_enrollment_line(&mut out, enrollment)?;
            }
            if let Some(active) = active_enrollment(&enrollments)
                && active.status == EnrollmentStatus::PendingPayment
            {
                writeln!(
                    out,
                    "Inscrição {} aguardando pagamento: camp-enroll pay {} --method pix-cash",
                    active.id, active.id
                )?;
            }
        }
        Command::Plans { enrollment } => {
            app.require_login().await?;
            let mut flow = app.payment_flow(enrollment);
            flow.load(None).await?;
            for plan in flow.options() {
                writeln!(out, "{plan}")?;
            }
        }
        Command::Pay {
            enrollment,
            method,
            installments,
            card,
            watch,
        } => {
            app.require_login().await?;
            let mut flow = app.payment_flow(enrollment);
            flow.load(None).await?;
            let plan = flow.select_method(method, installments)?;
            writeln!(out, "{plan}")?;
            let payment = flow.submit(card.card().as_ref()).await?.clone();
            print_payment(&mut out, &payment)?;
            if watch {
                out.flush()?;
                report_watch(&mut out, flow.watch_until(shutdown).await?)?;
            }
        }
        Command::Status {
            enrollment,
            payment,
        } => {
            app.require_login().await?;
            let mut flow = app.payment_flow(enrollment);
            flow.load(payment).await?;
            if let Some(enrollment) = flow.enrollment() {
                print_enrollment_line(&mut out, enrollment)?;
                for payment in &enrollment.payments {
                    print_payment(&mut out, payment)?;
                }
            }
        }
        Command::Watch {
            enrollment,
            payment,
            timeout_secs,
        } => {
            app.require_login().await?;
            let mut flow = app.payment_flow(enrollment);
            flow.load(payment).await?;
            if let Some(payment) = flow.payment() {
                writeln!(
                    out,
                    "Acompanhando pagamento {} ({})",
                    payment.id,
                    payment.status.label()
                )?;
            }
            out.flush()?;
            let stop = async move {
                match timeout_secs {
                    Some(secs) => {
                        tokio::select! {
                            _ = shutdown => {}
                            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                        }
                    }
                    None => shutdown.await,
                }
            };
            report_watch(&mut out, flow.watch_until(stop).await?)?;
        }
        Command::Admin(command) => run_admin(&app, command, &mut out).await?,
    }

    Ok(())
}

async fn run_admin(app: &App, command: AdminCommand, out: &mut impl Write) -> Result<()> {
    let console = app.admin_console();
    match command {
        AdminCommand::Stats => {
            let stats = console.dashboard().await?;
            writeln!(
                out,
                "Inscrições: {} (pendentes {}, confirmadas {}, recentes {})",
                stats.enrollments.total,
                stats.enrollments.pending,
                stats.enrollments.confirmed,
                stats.enrollments.recent
            )?;
            writeln!(
                out,
                "Pagamentos: {} (confirmados {}, pendentes {})",
                stats.payments.total, stats.payments.confirmed, stats.payments.pending
            )?;
            writeln!(
                out,
                "Receita: {} (a receber {})",
                stats.revenue.total, stats.revenue.pending
            )?;
            for method in &stats.payment_methods {
                let label = method.payment_method.map(|m| m.label()).unwrap_or("-");
                writeln!(out, "  {label}: {}", method.count)?;
            }
        }
        AdminCommand::Enrollments {
            status,
            product,
            search,
            payment_method,
            csv,
        } => {
            let filter = EnrollmentFilter {
                status,
                product,
                search,
                payment_method,
            };
            let enrollments = console.enrollments(&filter).await?;
            match csv.as_deref() {
                Some("-") => EnrollmentWriter::new(&mut *out).write_enrollments(&enrollments)?,
                Some(path) => {
                    EnrollmentWriter::new(File::create(path)?).write_enrollments(&enrollments)?;
                    writeln!(out, "{} inscrições exportadas para {path}", enrollments.len())?;
                }
                None => {
                    for enrollment in &enrollments {
                        print_enrollment_line(out, enrollment)?;
                    }
                }
            }
        }
        AdminCommand::SetStatus { id, status } => {
            let enrollment = console.set_status(id, status).await?;
            print_enrollment_line(out, &enrollment)?;
        }
        AdminCommand::Products => {
            for product in console.products().await? {
                print_product_line(out, &product)?;
            }
        }
        AdminCommand::CreateProduct(fields) => {
            let product = console.create_product(&fields.into()).await?;
            writeln!(out, "Produto {} criado", product.id)?;
        }
        AdminCommand::UpdateProduct { id, fields } => {
            let product = console.update_product(id, &fields.into()).await?;
            writeln!(out, "Produto {} atualizado", product.id)?;
        }
        AdminCommand::DeleteProduct { id } => {
            console.delete_product(id).await?;
            writeln!(out, "Produto {id} removido")?;
        }
        AdminCommand::CreateBatch(fields) => {
            let batch = console.create_batch(&fields.into()).await?;
            writeln!(out, "Lote {} criado", batch.id)?;
        }
        AdminCommand::UpdateBatch { id, fields } => {
            let batch = console.update_batch(id, &fields.into()).await?;
            writeln!(out, "Lote {} atualizado", batch.id)?;
        }
        AdminCommand::DeleteBatch { id } => {
            console.delete_batch(id).await?;
            writeln!(out, "Lote {id} removido")?;
        }
    }
    Ok(())
}

/// Accepts inline JSON or `@path` to a JSON file.
fn read_form(raw: &str) -> Result<PersonalData> {
    let json = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => raw.to_string(),
    };
    serde_json::from_str(&json)
        .map_err(|e| EnrollError::Validation(format!("Dados do formulário inválidos: {e}")))
}

fn print_product_line(out: &mut impl Write, product: &Product) -> Result<()> {
    let (batch, price) = match &product.active_batch {
        Some(batch) => (batch.name.as_str(), batch.price.to_string()),
        None => ("sem lote ativo", "-".to_string()),
    };
    writeln!(out, "{}\t{}\t{}\t{}", product.id, product.name, batch, price)?;
    Ok(())
}

fn print_product(out: &mut impl Write, product: &Product) -> Result<()> {
    writeln!(out, "{} (#{})", product.name, product.id)?;
    if !product.description.is_empty() {
        writeln!(out, "{}", product.description)?;
    }
    if let Some(remaining) = product.time_until_event(Utc::now()) {
        writeln!(out, "Faltam {}", format_countdown(remaining))?;
    }
    match &product.active_batch {
        Some(batch) => {
            writeln!(out, "Lote: {}", batch.name)?;
            if let Some(remaining) = batch.remaining() {
                writeln!(out, "Vagas restantes: {remaining}")?;
            }
            for plan in crate::domain::payment::InstallmentPlan::options(batch) {
                writeln!(out, "  {plan}")?;
            }
        }
        None => writeln!(out, "Inscrições encerradas")?,
    }
    Ok(())
}

fn print_enrollment_line(out: &mut impl Write, enrollment: &Enrollment) -> Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}",
        enrollment.id,
        enrollment.product_label(),
        enrollment.batch_label(),
        enrollment.status.label(),
        enrollment.final_amount,
        FormStep::for_enrollment(enrollment).title()
    )?;
    Ok(())
}

fn print_payment(out: &mut impl Write, payment: &Payment) -> Result<()> {
    writeln!(
        out,
        "Pagamento {} parcela {}: {} ({})",
        payment.id,
        payment.installment_number,
        payment.amount,
        payment.status.label()
    )?;
    if let Some(code) = payment.pix_code() {
        writeln!(out, "PIX copia e cola: {code}")?;
    }
    if let Some(url) = &payment.payment_url {
        writeln!(out, "Link: {url}")?;
    }
    Ok(())
}

fn report_watch(out: &mut impl Write, outcome: WatchOutcome) -> Result<()> {
    match outcome {
        WatchOutcome::Confirmed(payment) => {
            writeln!(out, "Pagamento {} confirmado!", payment.id)?;
        }
        WatchOutcome::Cancelled => {
            writeln!(out, "Acompanhamento interrompido")?;
        }
    }
    Ok(())
}
