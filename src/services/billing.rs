use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        order, order_details,
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    services::orders::OrderService,
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN_LEFT: u32 = 50;
const TOP_Y: u32 = 790;
const LINE_HEIGHT: u32 = 16;
const ROWS_PER_PAGE: usize = 32;
/// x offsets of Name / Description / Quantity / Price / Subtotal
const COLUMNS: [u32; 5] = [50, 190, 350, 420, 490];

/// One row of the bill table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillRow {
    pub name: String,
    pub description: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

/// Everything printed on a bill, independent of the output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillDocument {
    pub platform_name: String,
    pub order_uuid: String,
    pub issued_on: String,
    pub buyer: Vec<String>,
    pub rows: Vec<BillRow>,
    pub total: Decimal,
}

impl BillDocument {
    /// Lays out header, buyer block, one row per order line and the stored total.
    /// `descriptions` maps product id to catalog description; missing ones print empty.
    pub fn build(
        platform_name: &str,
        order: &order::Model,
        lines: &[order_details::Model],
        descriptions: &HashMap<i32, String>,
    ) -> Self {
        let buyer = vec![
            format!("Name: {}", order.name),
            format!("Email: {}", order.email),
            format!("Contact: {}", order.contact_number),
            format!(
                "Address: {}, {}, {}, {} {}",
                order.address, order.city, order.state, order.country, order.postal_code
            ),
            format!("Payment method: {}", order.payment_method),
        ];

        let rows = lines
            .iter()
            .map(|line| BillRow {
                name: line.product_name.clone(),
                description: descriptions
                    .get(&line.product_id)
                    .cloned()
                    .unwrap_or_default(),
                quantity: line.quantity,
                price: line.unit_price,
                subtotal: line.subtotal,
            })
            .collect();

        Self {
            platform_name: platform_name.to_string(),
            order_uuid: order.uuid.clone(),
            issued_on: order.created_at.format("%Y-%m-%d").to_string(),
            buyer,
            rows,
            total: order.total_amount,
        }
    }
}

/// Output format for bills
pub trait BillRenderer: Send + Sync {
    fn file_extension(&self) -> &'static str;
    fn render(&self, document: &BillDocument) -> Result<Vec<u8>, ServiceError>;
}

/// Writes plain PDF 1.4 with the built-in Helvetica font
#[derive(Debug, Default, Clone)]
pub struct PdfBillRenderer;

struct TextOp {
    x: u32,
    y: u32,
    size: u32,
    text: String,
}

fn text(ops: &mut Vec<TextOp>, x: u32, y: u32, size: u32, text: String) {
    ops.push(TextOp { x, y, size, text });
}

impl PdfBillRenderer {
    fn layout(document: &BillDocument) -> Vec<Vec<TextOp>> {
        let mut pages = Vec::new();
        let chunks: Vec<&[BillRow]> = if document.rows.is_empty() {
            vec![&[]]
        } else {
            document.rows.chunks(ROWS_PER_PAGE).collect()
        };
        let last = chunks.len() - 1;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut ops = Vec::new();
            let mut y = TOP_Y;
            text(&mut ops, MARGIN_LEFT, y, 20, document.platform_name.clone());
            y -= LINE_HEIGHT * 2;
            text(&mut ops, MARGIN_LEFT, y, 11, format!("Bill for order {}", document.order_uuid));
            y -= LINE_HEIGHT;
            text(&mut ops, MARGIN_LEFT, y, 11, format!("Date: {}", document.issued_on));
            y -= LINE_HEIGHT * 2;

            if index == 0 {
                for line in &document.buyer {
                    text(&mut ops, MARGIN_LEFT, y, 10, line.clone());
                    y -= LINE_HEIGHT;
                }
                y -= LINE_HEIGHT;
            }

            for (x, header) in COLUMNS
                .iter()
                .zip(["Name", "Description", "Quantity", "Price", "Subtotal"])
            {
                text(&mut ops, *x, y, 11, header.to_string());
            }
            y -= LINE_HEIGHT;

            for row in chunk {
                let cells = [
                    truncate(&row.name, 24),
                    truncate(&row.description, 26),
                    row.quantity.to_string(),
                    format!("{:.2}", row.price),
                    format!("{:.2}", row.subtotal),
                ];
                for (x, cell) in COLUMNS.iter().zip(cells) {
                    text(&mut ops, *x, y, 10, cell);
                }
                y -= LINE_HEIGHT;
            }

            if index == last {
                y -= LINE_HEIGHT;
                text(&mut ops, COLUMNS[3], y, 12, format!("Total: {:.2}", document.total));
            }
            pages.push(ops);
        }
        pages
    }
}

impl BillRenderer for PdfBillRenderer {
    fn file_extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, document: &BillDocument) -> Result<Vec<u8>, ServiceError> {
        let pages = Self::layout(document);
        // 1 catalog, 2 page tree, 3 font, then a page + content pair per page
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();

        let mut objects: Vec<String> = Vec::with_capacity(3 + pages.len() * 2);
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{} 0 R", id))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ));
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        for (page, id) in pages.iter().zip(&page_ids) {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                id + 1
            ));
            let mut stream = String::new();
            for op in page {
                writeln!(
                    stream,
                    "BT /F1 {} Tf {} {} Td ({}) Tj ET",
                    op.size,
                    op.x,
                    op.y,
                    escape_pdf_text(&op.text)
                )
                .map_err(|e| ServiceError::InternalError(format!("Failed to lay out bill: {}", e)))?;
            }
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                stream.len(),
                stream
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        let xref_at = out.len();
        out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            out.push_str(&format!("{:010} 00000 n \n", offset));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        ));
        Ok(out.into_bytes())
    }
}

/// Escapes PDF string delimiters. The base font only covers ASCII.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

/// Result of a bill render
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillGenerated {
    pub message: String,
    pub file_name: String,
}

/// `<uuid>.<ext>`, refused unless it is a single plain path component
pub fn bill_file_name(uuid: &str, extension: &str) -> Result<String, ServiceError> {
    let file_name = format!("{}.{}", uuid, extension);
    let mut components = Path::new(&file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !uuid.is_empty() => Ok(file_name),
        _ => {
            warn!(uuid = %uuid, "Order uuid cannot be used as a bill file name");
            Err(ServiceError::ValidationError(
                "uuid: cannot be used as a bill file name".to_string(),
            ))
        }
    }
}

/// Renders order bills into the configured directory
#[derive(Clone)]
pub struct BillingService {
    db_pool: Arc<DbPool>,
    orders: OrderService,
    renderer: Arc<dyn BillRenderer>,
    bill_dir: PathBuf,
    platform_name: String,
}

impl BillingService {
    pub fn new(
        db_pool: Arc<DbPool>,
        orders: OrderService,
        renderer: Arc<dyn BillRenderer>,
        bill_dir: impl Into<PathBuf>,
        platform_name: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            orders,
            renderer,
            bill_dir: bill_dir.into(),
            platform_name: platform_name.into(),
        }
    }

    /// Writes `<bill_dir>/<uuid>.<ext>` for an order visible to the caller
    #[instrument(skip(self, caller), fields(user_id = caller.user_id))]
    pub async fn generate_bill(
        &self,
        caller: &AuthUser,
        order_id: i32,
    ) -> Result<BillGenerated, ServiceError> {
        let (order, lines) = self.orders.order_with_lines(caller, order_id).await?;

        let product_ids: Vec<i32> = lines.iter().map(|l| l.product_id).collect();
        let descriptions: HashMap<i32, String> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to load products for bill");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .filter_map(|p| p.description.map(|d| (p.id, d)))
            .collect();

        let document = BillDocument::build(&self.platform_name, &order, &lines, &descriptions);
        let bytes = self.renderer.render(&document)?;

        tokio::fs::create_dir_all(&self.bill_dir).await.map_err(|e| {
            error!(error = %e, dir = %self.bill_dir.display(), "Failed to create bill directory");
            ServiceError::InternalError(format!("Failed to create bill directory: {}", e))
        })?;
        let file_name = bill_file_name(&order.uuid, self.renderer.file_extension())?;
        let path = self.bill_dir.join(&file_name);
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "Failed to write bill");
            ServiceError::InternalError(format!("Failed to write bill: {}", e))
        })?;

        counter!("fitmarket_bills.generated", 1);
        info!(order_id, path = %path.display(), bytes = bytes.len(), "Bill generated");

        Ok(BillGenerated {
            message: "Bill generated successfully".to_string(),
            file_name,
        })
    }
}
