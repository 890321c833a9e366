use async_trait::async_trait;
use crates::{
    domain::value_objects::gateway::{CreatedInvoice, GatewayLookup, NewInvoice},
    payments::paylink_client::{PaylinkClient, PaylinkError},
};

/// The slice of the gateway client the use cases depend on. Lookups return the
/// normalized shape only, so nothing above this trait sees raw gateway field names.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn currency(&self) -> String;

    async fn create_invoice(&self, invoice: NewInvoice) -> Result<CreatedInvoice, PaylinkError>;

    async fn get_invoice(&self, invoice_id: &str) -> GatewayLookup;

    async fn get_transaction_by_number(&self, transaction_no: &str) -> GatewayLookup;
}

#[async_trait]
impl PaymentGateway for PaylinkClient {
    fn currency(&self) -> String {
        PaylinkClient::currency(self).to_string()
    }

    async fn create_invoice(&self, invoice: NewInvoice) -> Result<CreatedInvoice, PaylinkError> {
        self.create_invoice(invoice).await
    }

    async fn get_invoice(&self, invoice_id: &str) -> GatewayLookup {
        self.get_invoice(invoice_id).await
    }

    async fn get_transaction_by_number(&self, transaction_no: &str) -> GatewayLookup {
        self.get_transaction_by_number(transaction_no).await
    }
}
