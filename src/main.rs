//! Rule engine simulation.
//!
//! Builds one data set per order in a small in-memory blotter, wires
//! field, lookup, streaming, constant and compound sources, and runs a
//! routing rule set while order and price updates stream in.

use rulemsx_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct BlotterOrder {
    sequence: i64,
    ticker: &'static str,
    exchange: &'static str,
    asset_class: &'static str,
    amount: i64,
}

const BLOTTER: [BlotterOrder; 3] = [
    BlotterOrder { sequence: 1001, ticker: "IBM US Equity", exchange: "US", asset_class: "Equity", amount: 1000 },
    BlotterOrder { sequence: 1002, ticker: "VOD LN Equity", exchange: "LN", asset_class: "Equity", amount: 250 },
    BlotterOrder { sequence: 1003, ticker: "AAPL US Equity", exchange: "US", asset_class: "Equity", amount: 400 },
];

fn isin_lookup(field: &str, key: &str) -> Result<Value, FetchError> {
    let isin = match key {
        "IBM US Equity" => "US4592001014",
        "AAPL US Equity" => "US0378331005",
        "VOD LN Equity" => "GB00BH4HKS39",
        _ => {
            return Err(FetchError {
                field: field.to_string(),
                key: key.to_string(),
                reason: "unknown security".to_string(),
            })
        }
    };
    Ok(Value::from(isin))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("Rule Engine Simulation");
    println!("Order blotter routing with live field and price updates\n");

    let mut engine = Engine::try_new(EngineConfig::development())?;
    let hub = FeedHub::new();
    let log = ActionLog::new();
    let fetcher: Arc<dyn ReferenceFetcher> = Arc::new(isin_lookup);

    scenario_1_build_data_sets(&mut engine, &hub, &fetcher)?;
    scenario_2_build_rules(&mut engine, &log)?;
    scenario_3_first_walk(&mut engine, &log)?;
    scenario_4_updates(&mut engine, &hub, &log)?;

    println!("\nEvents recorded: {}, failures: {}", engine.events().len(), engine.failures().count());
    println!("All simulations completed successfully.");
    Ok(())
}

/// One data set per order. Points first, sources and dependencies after.
fn scenario_1_build_data_sets(
    engine: &mut Engine,
    hub: &FeedHub,
    fetcher: &Arc<dyn ReferenceFetcher>,
) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Data Sets\n");

    for order in &BLOTTER {
        let data_set = engine.create_data_set(format!("Order{}", order.sequence))?;
        let topic = format!("order:{}", order.sequence);

        let order_no = data_set.add_data_point("OrderNo")?;
        order_no.set_source(Arc::new(FieldSource::new("EMSX_SEQUENCE", order.sequence)));

        let asset_class = data_set.add_data_point("AssetClass")?;
        asset_class.set_source(Arc::new(FieldSource::new("EMSX_ASSET_CLASS", order.asset_class)));

        let amount = data_set.add_data_point("Amount")?;
        amount.set_source(Arc::new(FieldSource::new("EMSX_AMOUNT", order.amount)));
        hub.subscribe(&topic, &data_set, &amount)?;

        let exchange = data_set.add_data_point("Exchange")?;
        exchange.set_source(Arc::new(FieldSource::new("EMSX_EXCHANGE", order.exchange)));

        let ticker = data_set.add_data_point("Ticker")?;
        ticker.set_source(Arc::new(ConstantSource::new(order.ticker)));

        let isin = data_set.add_data_point("ISIN")?;
        isin.set_source(Arc::new(ReferenceSource::new("ID_ISIN", order.ticker, Arc::clone(fetcher))));

        let last_price = data_set.add_data_point("LastPrice")?;
        last_price.set_source(Arc::new(StreamingSource::new("LAST_PRICE", order.ticker)));
        hub.subscribe(order.ticker, &data_set, &last_price)?;

        let margin = data_set.add_data_point("Margin")?;
        margin.set_source(Arc::new(ConstantSource::new(dec!(2.0))));

        let new_price = data_set.add_data_point("NewPrice")?;
        new_price.set_source(Arc::new(CompoundSource::new(|inputs| {
            Ok(Value::from(inputs.number("Margin")? + inputs.number("LastPrice")?))
        })));
        data_set.add_dependency(&new_price, &margin)?;
        data_set.add_dependency(&new_price, &last_price)?;

        println!("  {}: {} points, order {}", data_set.name(), data_set.len(), data_set.evaluation_order().join(" > "));
    }

    for (ticker, price) in [("IBM US Equity", dec!(140.25)), ("VOD LN Equity", dec!(72.10)), ("AAPL US Equity", dec!(189.50))] {
        hub.publish(&Notification::new(ticker, vec![FieldChange::new("LAST_PRICE", Decimal::ZERO, price)]));
    }
    println!();
    Ok(())
}

/// Routing tree: US orders go to DMTB, and IBM gets its own desk on top.
fn scenario_2_build_rules(engine: &mut Engine, log: &ActionLog) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Rule Set\n");

    let rules = engine.create_rule_set("Routing")?;

    let us = rules.add_rule(Rule::new(
        "IsUSExchange",
        Arc::new(Condition::equals("Exchange", "US")),
        Arc::new(RecordAction::new("routed to DMTB", log.clone())),
    ))?;
    us.add_rule(Rule::new(
        "IsIBM",
        Arc::new(Condition::equals("Ticker", "IBM US Equity")),
        Arc::new(RecordAction::new("IBM desk notified", log.clone())),
    ))?;

    rules.add_rule(Rule::new(
        "LargeOrder",
        Arc::new(Condition::new("Amount", CompareOp::Ge, 500)),
        Arc::new(RecordAction::new("flagged for review", log.clone())),
    ))?;

    rules.add_rule(Rule::new(
        "PriceCap",
        Arc::new(Condition::below("NewPrice", dec!(150))),
        Arc::new(RecordAction::new("within price cap", log.clone())),
    ))?;

    println!("  Rules: {}\n", rules.rule_paths().join(", "));
    Ok(())
}

fn scenario_3_first_walk(engine: &mut Engine, log: &ActionLog) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Full Walk\n");

    for report in engine.execute_all("Routing")? {
        println!("  {}: fired [{}], failures {}", report.data_set, report.fired().join(", "), report.failures.len());
    }
    for entry in log.entries() {
        println!("    {}", entry);
    }
    log.clear();
    println!();
    Ok(())
}

/// Updates arrive through the hub; only data sets whose changes touch a
/// rule get walked again.
fn scenario_4_updates(engine: &mut Engine, hub: &FeedHub, log: &ActionLog) -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Incremental Updates\n");

    let mut tracker = ChangeTracker::new();
    hub.publish_tracked(
        &Notification::new("order:1002", vec![FieldChange::new("EMSX_AMOUNT", 250, 900)]),
        &mut tracker,
    );
    hub.publish_tracked(
        &Notification::new("IBM US Equity", vec![FieldChange::new("LAST_PRICE", dec!(140.25), dec!(151.00))]),
        &mut tracker,
    );

    for data_set in tracker.data_sets() {
        println!("  {} changed: {}", data_set, tracker.changed(&data_set).join(", "));
        if let Some(report) = engine.execute_if_affected("Routing", &data_set, &mut tracker)? {
            println!("  {} re-walked, fired [{}]", data_set, report.fired().join(", "));
        }
    }

    let ibm = engine.data_set("Order1001")?;
    println!("  Order1001 NewPrice now {}, ISIN {}", ibm.value("NewPrice")?, ibm.value("ISIN")?);
    for entry in log.entries() {
        println!("    {}", entry);
    }
    Ok(())
}
