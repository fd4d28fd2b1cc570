use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

use crate::config::AppConfig;

/// SMTP notification sender. When `SMTP_HOST` is not configured the mailer
/// logs the message instead of sending it, so dev and test environments do
/// not need a mail server.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    base_url: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let transport = match &config.smtp.host {
            Some(host) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                        .port(config.smtp.port);
                if !config.smtp.username.is_empty() {
                    builder = builder.credentials(Credentials::new(
                        config.smtp.username.clone(),
                        config.smtp.password.clone(),
                    ));
                }
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self {
            transport,
            from_address: config.smtp.from_address.clone(),
            base_url: config.public_base_url.clone(),
        })
    }

    /// Mailer that only logs. Used by the integration tests.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from_address: "no-reply@movie-store.local".to_string(),
            base_url: "http://127.0.0.1:3000".to_string(),
        }
    }

    async fn send(&self, recipient: &str, subject: &str, html: String) -> anyhow::Result<()> {
        let Some(transport) = &self.transport else {
            tracing::info!(to = %recipient, subject = %subject, "smtp disabled, email not sent");
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        transport.send(message).await?;
        Ok(())
    }

    pub async fn send_activation_email(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let link = format!("{}/api/auth/activate", self.base_url);
        let html = format!(
            "<p>Welcome! Confirm your account by posting this token to \
             <a href=\"{link}\">{link}</a>:</p><p><code>{token}</code></p>\
             <p>The token expires in 24 hours.</p>"
        );
        self.send(email, "Account activation", html).await
    }

    pub async fn send_activation_complete_email(&self, email: &str) -> anyhow::Result<()> {
        let link = format!("{}/api/auth/login", self.base_url);
        let html = format!(
            "<p>Your account is active. You can now <a href=\"{link}\">log in</a>.</p>"
        );
        self.send(email, "Account activated successfully", html)
            .await
    }

    pub async fn send_password_reset_email(&self, email: &str, token: &str) -> anyhow::Result<()> {
        let link = format!("{}/api/auth/password-reset/complete", self.base_url);
        let html = format!(
            "<p>A password reset was requested for your account. Post this token \
             together with your new password to <a href=\"{link}\">{link}</a>:</p>\
             <p><code>{token}</code></p><p>The token expires in 1 hour.</p>"
        );
        self.send(email, "Password reset request", html).await
    }

    pub async fn send_password_reset_complete_email(&self, email: &str) -> anyhow::Result<()> {
        let link = format!("{}/api/auth/login", self.base_url);
        let html = format!(
            "<p>Your password was changed. You can <a href=\"{link}\">log in</a> \
             with the new password.</p>"
        );
        self.send(email, "Password reset successfully", html).await
    }

    pub async fn send_comment_reply_email(
        &self,
        email: &str,
        movie_title: &str,
    ) -> anyhow::Result<()> {
        let html = format!(
            "<p>Someone replied to your comment on \"{movie_title}\".</p>"
        );
        self.send(email, "New reply to your comment", html).await
    }

    pub async fn send_cart_removal_email(
        &self,
        email: &str,
        movie_title: &str,
    ) -> anyhow::Result<()> {
        let html = format!("<p>\"{movie_title}\" was removed from your cart.</p>");
        self.send(email, "Movie removed from cart", html).await
    }

    pub async fn send_movie_retired_email(
        &self,
        email: &str,
        movie_title: &str,
    ) -> anyhow::Result<()> {
        let html = format!(
            "<p>\"{movie_title}\" is no longer available and was removed from \
             your cart.</p>"
        );
        self.send(email, "Movie no longer available", html).await
    }

    pub async fn send_order_confirmation_email(
        &self,
        email: &str,
        order_id: uuid::Uuid,
        total_amount: i64,
    ) -> anyhow::Result<()> {
        let html = format!(
            "<p>Your order <code>{order_id}</code> is confirmed.</p>\
             <p>Total: {}.{:02}</p>",
            total_amount / 100,
            total_amount % 100
        );
        self.send(email, "Order confirmation", html).await
    }

    pub async fn send_payment_confirmation_email(
        &self,
        email: &str,
        order_id: uuid::Uuid,
        amount: i64,
    ) -> anyhow::Result<()> {
        let html = format!(
            "<p>We received your payment of {}.{:02} for order \
             <code>{order_id}</code>. Enjoy your movies!</p>",
            amount / 100,
            amount % 100
        );
        self.send(email, "Payment confirmation", html).await
    }

    pub async fn send_refund_decision_email(
        &self,
        email: &str,
        order_id: uuid::Uuid,
        approved: bool,
    ) -> anyhow::Result<()> {
        let html = if approved {
            format!(
                "<p>Your refund request for order <code>{order_id}</code> was \
                 approved. The payment will be returned to you.</p>"
            )
        } else {
            format!(
                "<p>Your refund request for order <code>{order_id}</code> was \
                 rejected.</p>"
            )
        };
        self.send(email, "Refund request decision", html).await
    }
}
