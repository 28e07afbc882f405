//! # Report Repository
//!
//! Read-only aggregations for the reports pages and the home dashboard.
//! Nothing is cached: every call recomputes from the raw rows.
//!
//! ## Default Windows
//! ```text
//! ┌─────────────────┬──────────────────────────────┐
//! │ dashboard       │ last 30 days                 │
//! │ daily_balance   │ one day, default today       │
//! │ revenue         │ last 30 days                 │
//! │ inventory       │ no window                    │
//! │ sales           │ last 7 days                  │
//! │ profit          │ last 30 days                 │
//! │ vat             │ current calendar month       │
//! │ main_dashboard  │ today                        │
//! └─────────────────┴──────────────────────────────┘
//! ```
//! Dates are UTC calendar days of `order_date`, `payment_date` and
//! movement `created_at`. Every invoice in the window counts, notes
//! included, except on the home dashboard which skips cancelled ones.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use optics_core::inventory::{ProductView, StockStatus};
use optics_core::invoice::{percentage_of, Sale};
use optics_core::{Money, PaymentMethod, VAT_RATE};

use super::product::{ProductFilter, ProductRepository};
use super::sale::{SaleRepository, SaleSummaryRow, StatusCount, SALE_COLUMNS};
use crate::error::DbResult;

// =============================================================================
// Window
// =============================================================================

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl ReportWindow {
    /// `date_to` defaults to today and `date_from` to `days` before it.
    ///
    /// A `date_to` so close to the start of the calendar that `days` before
    /// it does not exist is ignored like any other unusable filter.
    pub fn last_days(date_from: Option<NaiveDate>, date_to: Option<NaiveDate>, days: i64, today: NaiveDate) -> Self {
        let span = Duration::days(days);
        let date_to = date_to.unwrap_or(today);
        if let Some(date_from) = date_from {
            return ReportWindow { date_from, date_to };
        }

        match date_to.checked_sub_signed(span) {
            Some(date_from) => ReportWindow { date_from, date_to },
            None => ReportWindow {
                date_from: today.checked_sub_signed(span).unwrap_or(today),
                date_to: today,
            },
        }
    }

    /// Defaults to the calendar month containing `today`.
    pub fn month_of(date_from: Option<NaiveDate>, date_to: Option<NaiveDate>, today: NaiveDate) -> Self {
        let first = today.with_day(1).unwrap_or(today);
        let last = next_month(first).map_or(today, |n| n - Duration::days(1));
        ReportWindow {
            date_from: date_from.unwrap_or(first),
            date_to: date_to.unwrap_or(last),
        }
    }

    fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.date_to;
        self.date_from.iter_days().take_while(move |d| *d <= to)
    }

    /// `YYYY-MM` of every month the window touches.
    fn months(&self) -> Vec<String> {
        let mut months = Vec::new();
        let mut cursor = self.date_from.with_day(1);
        while let Some(month) = cursor {
            if month > self.date_to {
                break;
            }
            months.push(month.format("%Y-%m").to_string());
            cursor = next_month(month);
        }
        months
    }
}

fn next_month(first: NaiveDate) -> Option<NaiveDate> {
    if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
}

// =============================================================================
// Report rows
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct SalesAggregate {
    pub count: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyAmount {
    pub date: NaiveDate,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyAmount {
    pub month: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSales {
    pub product_name: String,
    pub barcode: String,
    pub total_quantity: i64,
    pub total_amount_cents: i64,
}

/// Sales per category; `None` is the uncategorized bucket.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryAmount {
    pub category_name: Option<String>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MethodAmount {
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HourCount {
    pub hour: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerSales {
    pub customer_name: String,
    pub customer_code: String,
    pub total_orders: i64,
    pub total_amount_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryValue {
    pub id: String,
    pub name: String,
    pub product_count: i64,
    pub total_quantity: i64,
    pub total_value_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductProfit {
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyVat {
    pub date: NaiveDate,
    pub sales_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VatByMethod {
    pub payment_method: PaymentMethod,
    pub total_tax_cents: i64,
    pub total_amount_cents: i64,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    #[serde(flatten)]
    pub window: ReportWindow,
    pub sales: SalesAggregate,
    pub total_products: i64,
    pub low_stock_products: i64,
    pub total_customers: i64,
    pub new_customers: i64,
    /// The seven days ending today, oldest first, zero-filled.
    pub daily_sales: Vec<DailyAmount>,
    pub top_products: Vec<ProductSales>,
    pub top_categories: Vec<CategoryAmount>,
    pub order_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBalanceReport {
    pub date: NaiveDate,
    pub sales: SalesAggregate,
    pub total_payments_cents: i64,
    /// `in` movements that day.
    pub purchases_count: i64,
    /// `return` movements that day.
    pub returns_count: i64,
    pub payment_methods: Vec<MethodAmount>,
    /// Hours with at least one invoice.
    pub hourly_sales: Vec<HourCount>,
    pub sales_list: Vec<Sale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    #[serde(flatten)]
    pub window: ReportWindow,
    pub count: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub monthly_revenue: Vec<MonthlyAmount>,
    pub payment_methods: Vec<MethodAmount>,
    pub category_revenue: Vec<CategoryAmount>,
}

/// Inventory report filters.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub category_id: Option<String>,
    pub stock_status: Option<StockStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    pub total_products: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub total_cost_value_cents: i64,
    pub total_selling_value_cents: i64,
    pub expected_profit_cents: i64,
    pub category_stock: Vec<CategoryValue>,
    pub top_value_products: Vec<ProductView>,
    /// By category name, then item name.
    pub products: Vec<ProductView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    #[serde(flatten)]
    pub window: ReportWindow,
    pub total_count: i64,
    pub total_amount_cents: i64,
    pub average_amount_cents: i64,
    pub total_paid_cents: i64,
    pub top_products: Vec<ProductSales>,
    pub top_customers: Vec<CustomerSales>,
    /// Newest first, at most 100.
    pub sales: Vec<Sale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitReport {
    #[serde(flatten)]
    pub window: ReportWindow,
    pub total_revenue_cents: i64,
    pub total_cost_cents: i64,
    pub total_profit_cents: i64,
    pub profit_margin: f64,
    /// Best first, at most 20.
    pub product_profits: Vec<ProductProfit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VatReport {
    #[serde(flatten)]
    pub window: ReportWindow,
    pub vat_rate: f64,
    pub total_sales_count: i64,
    pub total_subtotal_cents: i64,
    pub total_discount_cents: i64,
    pub total_taxable_cents: i64,
    pub total_tax_cents: i64,
    pub total_with_tax_cents: i64,
    /// Days with sales only.
    pub daily_vat: Vec<DailyVat>,
    pub vat_by_payment: Vec<VatByMethod>,
    pub sales_details: Vec<Sale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MainDashboard {
    pub today_sales_count: i64,
    pub today_sales_total_cents: i64,
    pub current_invoices: Vec<SaleSummaryRow>,
    pub status_counts: Vec<StatusCount>,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
}

// =============================================================================
// Repository
// =============================================================================

const IN_WINDOW: &str = "date(s.order_date) BETWEEN ?1 AND ?2";

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Reports home page.
    pub async fn dashboard(&self, window: ReportWindow) -> DbResult<DashboardReport> {
        debug!(?window, "Dashboard report");
        let today = Utc::now().date_naive();

        let sales = self.sales_aggregate(window).await?;

        let (total_products, low_stock_products): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN quantity > 0 AND quantity <= min_quantity THEN 1 ELSE 0 END), 0)
            FROM products WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (total_customers, new_customers): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN date(created_at) BETWEEN ?1 AND ?2 THEN 1 ELSE 0 END), 0)
            FROM customers
            "#,
        )
        .bind(window.date_from)
        .bind(window.date_to)
        .fetch_one(&self.pool)
        .await?;

        let week = ReportWindow::last_days(None, Some(today), 6, today);
        let daily_sales = self.daily_totals(week).await?;

        let top_products = self.top_products(window, 5).await?;
        let top_categories = self.category_revenue(window, 5).await?;

        let sql = format!(
            "SELECT s.status AS status, COUNT(*) AS count FROM sales s WHERE {IN_WINDOW} GROUP BY s.status ORDER BY s.status"
        );
        let order_status = sqlx::query_as::<_, StatusCount>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?;

        Ok(DashboardReport {
            window,
            sales,
            total_products,
            low_stock_products,
            total_customers,
            new_customers,
            daily_sales,
            top_products,
            top_categories,
            order_status,
        })
    }

    /// Cash-up for a single day.
    pub async fn daily_balance(&self, date: NaiveDate) -> DbResult<DailyBalanceReport> {
        debug!(%date, "Daily balance report");
        let day = ReportWindow {
            date_from: date,
            date_to: date,
        };

        let sales = self.sales_aggregate(day).await?;

        let total_payments_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE date(payment_date) = ?1",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        let (purchases_count, returns_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN movement_type = 'in' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN movement_type = 'return' THEN 1 ELSE 0 END), 0)
            FROM stock_movements WHERE date(created_at) = ?1
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        let payment_methods = sqlx::query_as::<_, MethodAmount>(
            r#"
            SELECT payment_method, SUM(amount_cents) AS total_cents
            FROM payments WHERE date(payment_date) = ?1
            GROUP BY payment_method ORDER BY payment_method
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let hourly_sales = sqlx::query_as::<_, HourCount>(
            r#"
            SELECT strftime('%H', order_date) || ':00' AS hour, COUNT(*) AS count
            FROM sales WHERE date(order_date) = ?1
            GROUP BY hour ORDER BY hour
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let sales_list = self.sales_in(day, 20).await?;

        Ok(DailyBalanceReport {
            date,
            sales,
            total_payments_cents,
            purchases_count,
            returns_count,
            payment_methods,
            hourly_sales,
            sales_list,
        })
    }

    pub async fn revenue(&self, window: ReportWindow) -> DbResult<RevenueReport> {
        debug!(?window, "Revenue report");

        let sql = format!(
            r#"SELECT COUNT(*), COALESCE(SUM(s.subtotal_cents), 0), COALESCE(SUM(s.discount_cents), 0),
                COALESCE(SUM(s.tax_cents), 0), COALESCE(SUM(s.total_cents), 0), COALESCE(SUM(s.paid_cents), 0)
            FROM sales s WHERE {IN_WINDOW}"#
        );
        let (count, subtotal_cents, discount_cents, tax_cents, total_cents, paid_cents): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"SELECT strftime('%Y-%m', s.order_date) AS month, SUM(s.total_cents) AS amount
            FROM sales s WHERE {IN_WINDOW} GROUP BY month"#
        );
        let by_month: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();
        let monthly_revenue = window
            .months()
            .into_iter()
            .map(|month| MonthlyAmount {
                amount_cents: by_month.get(&month).copied().unwrap_or(0),
                month,
            })
            .collect();

        let payment_methods = sqlx::query_as::<_, MethodAmount>(
            r#"
            SELECT payment_method, SUM(amount_cents) AS total_cents
            FROM payments WHERE date(payment_date) BETWEEN ?1 AND ?2
            GROUP BY payment_method ORDER BY total_cents DESC
            "#,
        )
        .bind(window.date_from)
        .bind(window.date_to)
        .fetch_all(&self.pool)
        .await?;

        let category_revenue = self.category_revenue(window, 10).await?;

        Ok(RevenueReport {
            window,
            count,
            subtotal_cents,
            discount_cents,
            tax_cents,
            total_cents,
            paid_cents,
            remaining_cents: total_cents - paid_cents,
            monthly_revenue,
            payment_methods,
            category_revenue,
        })
    }

    /// Stock valuation over active products.
    pub async fn inventory(&self, filter: &InventoryFilter) -> DbResult<InventoryReport> {
        debug!(?filter, "Inventory report");

        let mut products = ProductRepository::new(self.pool.clone())
            .list(&ProductFilter {
                category_id: filter.category_id.clone(),
                status: filter.stock_status,
                ..Default::default()
            })
            .await?;

        let total_cost_value_cents = products
            .iter()
            .fold(0i64, |sum, p| sum.saturating_add(p.total_cost_value_cents));
        let total_selling_value_cents = products
            .iter()
            .fold(0i64, |sum, p| sum.saturating_add(p.total_selling_value_cents));

        let category_stock = sqlx::query_as::<_, CategoryValue>(
            r#"
            SELECT c.id, c.name, COUNT(p.id) AS product_count,
                COALESCE(SUM(p.quantity), 0) AS total_quantity,
                COALESCE(SUM(p.quantity * p.selling_price_cents), 0) AS total_value_cents
            FROM categories c
            JOIN products p ON p.category_id = c.id AND p.is_active = 1
            WHERE c.is_active = 1
            GROUP BY c.id
            ORDER BY total_value_cents DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut top_value_products = products.clone();
        top_value_products.sort_by(|a, b| b.total_selling_value_cents.cmp(&a.total_selling_value_cents));
        top_value_products.truncate(10);

        products.sort_by(|a, b| {
            (&a.product.category_name, &a.product.item_name).cmp(&(&b.product.category_name, &b.product.item_name))
        });

        Ok(InventoryReport {
            total_products: products.len() as i64,
            out_of_stock: products.iter().filter(|p| p.is_out_of_stock).count() as i64,
            low_stock: products.iter().filter(|p| p.is_low_stock).count() as i64,
            total_cost_value_cents,
            total_selling_value_cents,
            expected_profit_cents: total_selling_value_cents - total_cost_value_cents,
            category_stock,
            top_value_products,
            products,
        })
    }

    pub async fn sales(&self, window: ReportWindow) -> DbResult<SalesReport> {
        debug!(?window, "Sales report");

        let aggregate = self.sales_aggregate(window).await?;
        let average_amount_cents = if aggregate.count > 0 {
            aggregate.total_cents / aggregate.count
        } else {
            0
        };

        let top_products = self.top_products(window, 10).await?;

        let sql = format!(
            r#"SELECT c.name AS customer_name, c.customer_code, COUNT(s.id) AS total_orders,
                SUM(s.total_cents) AS total_amount_cents
            FROM sales s JOIN customers c ON c.id = s.customer_id
            WHERE {IN_WINDOW}
            GROUP BY c.id ORDER BY total_amount_cents DESC LIMIT 10"#
        );
        let top_customers = sqlx::query_as::<_, CustomerSales>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?;

        let sales = self.sales_in(window, 100).await?;

        Ok(SalesReport {
            window,
            total_count: aggregate.count,
            total_amount_cents: aggregate.total_cents,
            average_amount_cents,
            total_paid_cents: aggregate.paid_cents,
            top_products,
            top_customers,
            sales,
        })
    }

    /// Gross profit on product lines. Cost is the product's current cost
    /// price, not the price at the time of sale.
    pub async fn profit(&self, window: ReportWindow) -> DbResult<ProfitReport> {
        debug!(?window, "Profit report");

        let sql = format!(
            r#"SELECT p.item_name AS product_name,
                SUM(i.quantity) AS quantity,
                SUM(i.quantity * i.unit_price_cents) AS revenue_cents,
                SUM(i.quantity * p.cost_price_cents) AS cost_cents,
                SUM(i.quantity * (i.unit_price_cents - p.cost_price_cents)) AS profit_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            WHERE {IN_WINDOW}
            GROUP BY p.id
            ORDER BY profit_cents DESC"#
        );
        let mut product_profits = sqlx::query_as::<_, ProductProfit>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?;

        let total_revenue_cents: i64 = product_profits.iter().map(|p| p.revenue_cents).sum();
        let total_cost_cents: i64 = product_profits.iter().map(|p| p.cost_cents).sum();
        let total_profit_cents = total_revenue_cents - total_cost_cents;
        product_profits.truncate(20);

        Ok(ProfitReport {
            window,
            total_revenue_cents,
            total_cost_cents,
            total_profit_cents,
            profit_margin: percentage_of(Money::from_cents(total_profit_cents), Money::from_cents(total_revenue_cents)),
            product_profits,
        })
    }

    /// VAT return figures. Taxable amount is subtotal minus discount.
    pub async fn vat(&self, window: ReportWindow) -> DbResult<VatReport> {
        debug!(?window, "VAT report");

        let sql = format!(
            r#"SELECT COUNT(*), COALESCE(SUM(s.subtotal_cents), 0), COALESCE(SUM(s.discount_cents), 0),
                COALESCE(SUM(s.tax_cents), 0), COALESCE(SUM(s.total_cents), 0)
            FROM sales s WHERE {IN_WINDOW}"#
        );
        let (count, subtotal, discount, tax, total): (i64, i64, i64, i64, i64) = sqlx::query_as(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"SELECT date(s.order_date) AS day, COUNT(*), SUM(s.subtotal_cents), SUM(s.tax_cents), SUM(s.total_cents)
            FROM sales s WHERE {IN_WINDOW} GROUP BY day ORDER BY day"#
        );
        let rows = sqlx::query_as::<_, (String, i64, i64, i64, i64)>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?;
        let daily_vat = rows
            .into_iter()
            .filter(|row| row.4 != 0)
            .filter_map(|(day, sales_count, subtotal_cents, tax_cents, total_cents)| {
                Some(DailyVat {
                    date: NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()?,
                    sales_count,
                    subtotal_cents,
                    tax_cents,
                    total_cents,
                })
            })
            .collect();

        let sql = format!(
            r#"SELECT s.payment_method, SUM(s.tax_cents) AS total_tax_cents, SUM(s.total_cents) AS total_amount_cents
            FROM sales s WHERE {IN_WINDOW}
            GROUP BY s.payment_method ORDER BY total_tax_cents DESC"#
        );
        let vat_by_payment = sqlx::query_as::<_, VatByMethod>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?;

        let sales_details = self.sales_in(window, 100).await?;

        Ok(VatReport {
            window,
            vat_rate: VAT_RATE.percentage(),
            total_sales_count: count,
            total_subtotal_cents: subtotal,
            total_discount_cents: discount,
            total_taxable_cents: subtotal - discount,
            total_tax_cents: tax,
            total_with_tax_cents: total,
            daily_vat,
            vat_by_payment,
            sales_details,
        })
    }

    /// Home page: today's takings, open invoices and stock alerts.
    pub async fn main_dashboard(&self) -> DbResult<MainDashboard> {
        let today = Utc::now().date_naive();

        let (today_sales_count, today_sales_total_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_cents), 0)
            FROM sales WHERE date(order_date) = ?1 AND status != 'cancelled'
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        let current_invoices = SaleRepository::new(self.pool.clone()).current(10).await?;

        let status_counts = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM sales GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let (low_stock_count, out_of_stock_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN quantity > 0 AND quantity <= min_quantity THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN quantity = 0 THEN 1 ELSE 0 END), 0)
            FROM products WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MainDashboard {
            today_sales_count,
            today_sales_total_cents,
            current_invoices,
            status_counts,
            low_stock_count,
            out_of_stock_count,
        })
    }

    // =========================================================================
    // Shared pieces
    // =========================================================================

    async fn sales_aggregate(&self, window: ReportWindow) -> DbResult<SalesAggregate> {
        let sql = format!(
            r#"SELECT COUNT(*) AS count,
                COALESCE(SUM(s.total_cents), 0) AS total_cents,
                COALESCE(SUM(s.paid_cents), 0) AS paid_cents,
                COALESCE(SUM(s.total_cents - s.paid_cents), 0) AS remaining_cents
            FROM sales s WHERE {IN_WINDOW}"#
        );
        Ok(sqlx::query_as::<_, SalesAggregate>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_one(&self.pool)
            .await?)
    }

    /// One zero-filled total per day of the window.
    async fn daily_totals(&self, window: ReportWindow) -> DbResult<Vec<DailyAmount>> {
        let sql = format!(
            "SELECT date(s.order_date) AS day, SUM(s.total_cents) FROM sales s WHERE {IN_WINDOW} GROUP BY day"
        );
        let by_day: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();

        Ok(window
            .days()
            .map(|date| DailyAmount {
                amount_cents: by_day.get(&date.format("%Y-%m-%d").to_string()).copied().unwrap_or(0),
                date,
            })
            .collect())
    }

    async fn top_products(&self, window: ReportWindow, limit: i64) -> DbResult<Vec<ProductSales>> {
        let sql = format!(
            r#"SELECT p.item_name AS product_name, p.barcode,
                SUM(i.quantity) AS total_quantity,
                SUM(i.quantity * i.unit_price_cents) AS total_amount_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            WHERE {IN_WINDOW}
            GROUP BY p.id ORDER BY total_quantity DESC LIMIT ?3"#
        );
        Ok(sqlx::query_as::<_, ProductSales>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn category_revenue(&self, window: ReportWindow, limit: i64) -> DbResult<Vec<CategoryAmount>> {
        let sql = format!(
            r#"SELECT c.name AS category_name, SUM(i.quantity * i.unit_price_cents) AS total_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE {IN_WINDOW}
            GROUP BY c.id ORDER BY total_cents DESC LIMIT ?3"#
        );
        Ok(sqlx::query_as::<_, CategoryAmount>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn sales_in(&self, window: ReportWindow, limit: i64) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales s WHERE {IN_WINDOW} ORDER BY s.order_date DESC LIMIT ?3"
        );
        Ok(sqlx::query_as::<_, Sale>(&sql)
            .bind(window.date_from)
            .bind(window.date_to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }
}
