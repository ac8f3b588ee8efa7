//! Staleness tests
//!
//! Per-source freshness rules, dependency propagation, and the lazy
//! fetch/recompute contract of pull sources.

use rulemsx_core::*;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fetcher that counts calls and fails the first `failures` of them.
struct CountingFetcher {
    calls: AtomicUsize,
    failures: usize,
    value: Value,
}

impl CountingFetcher {
    fn new(value: impl Into<Value>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures,
            value: value.into(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReferenceFetcher for CountingFetcher {
    fn fetch(&self, field: &str, key: &str) -> Result<Value, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(FetchError {
                field: field.to_string(),
                key: key.to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        Ok(self.value.clone())
    }
}

mod source_state_tests {
    use super::*;

    #[test]
    fn constant_is_always_current() {
        let set = DataSet::new("Order1");
        let margin = set.add_data_point("Margin").unwrap();
        margin.set_source(Arc::new(ConstantSource::new(dec!(2.0))));

        assert_eq!(margin.state().unwrap(), DataPointState::Current);
        margin.set_state(DataPointState::Stale).unwrap();
        assert_eq!(margin.state().unwrap(), DataPointState::Current);
        assert_eq!(set.value("Margin").unwrap(), Value::from(dec!(2.0)));
    }

    #[test]
    fn field_stays_stale_until_told_otherwise() {
        let set = DataSet::new("Order1");
        let amount = set.add_data_point("Amount").unwrap();
        amount.set_source(Arc::new(FieldSource::new("EMSX_AMOUNT", 500)));

        for _ in 0..3 {
            assert_eq!(amount.value(&set).unwrap(), Value::from(500));
            assert_eq!(amount.state().unwrap(), DataPointState::Stale);
        }

        amount.set_state(DataPointState::Current).unwrap();
        assert_eq!(amount.state().unwrap(), DataPointState::Current);
    }

    #[test]
    fn set_state_is_idempotent() {
        let set = DataSet::new("Order1");
        let amount = set.add_data_point("Amount").unwrap();
        amount.set_source(Arc::new(FieldSource::new("EMSX_AMOUNT", 500)));

        amount.set_state(DataPointState::Current).unwrap();
        amount.set_state(DataPointState::Current).unwrap();
        assert_eq!(amount.state().unwrap(), DataPointState::Current);

        amount.set_state(DataPointState::Stale).unwrap();
        amount.set_state(DataPointState::Stale).unwrap();
        assert_eq!(amount.state().unwrap(), DataPointState::Stale);
        assert_eq!(amount.value(&set).unwrap(), Value::from(500));
    }

    #[test]
    fn point_without_source_reports_missing_source() {
        let set = DataSet::new("Order1");
        let ticker = set.add_data_point("Ticker").unwrap();
        assert!(matches!(ticker.state(), Err(SourceError::MissingSource(_))));
        assert!(matches!(ticker.value(&set), Err(SourceError::MissingSource(_))));
        assert!(matches!(ticker.set_state(DataPointState::Stale), Err(SourceError::MissingSource(_))));
        assert!(ticker.source_kind().is_none());
    }

    #[test]
    fn set_source_round_trips_and_replaces_state() {
        let set = DataSet::new("Order1");
        let amount = set.add_data_point("Amount").unwrap();

        let first: Arc<dyn DataPointSource> = Arc::new(FieldSource::new("EMSX_AMOUNT", 500));
        amount.set_source(Arc::clone(&first));
        assert!(Arc::ptr_eq(&amount.source().unwrap(), &first));
        amount.set_state(DataPointState::Current).unwrap();

        let second: Arc<dyn DataPointSource> = Arc::new(FieldSource::new("EMSX_AMOUNT", 750));
        amount.set_source(Arc::clone(&second));
        assert!(Arc::ptr_eq(&amount.source().unwrap(), &second));
        assert_eq!(amount.state().unwrap(), DataPointState::Stale);
        assert_eq!(amount.value(&set).unwrap(), Value::from(750));
        assert_eq!(amount.source_kind(), Some(SourceKind::FieldBound));
    }

    #[test]
    fn streaming_has_no_value_before_first_push() {
        let set = DataSet::new("Order1");
        let last = set.add_data_point("LastPrice").unwrap();
        let stream = Arc::new(StreamingSource::new("LAST_PRICE", "IBM US Equity"));
        last.set_source(stream.clone());

        assert!(matches!(last.value(&set), Err(SourceError::NoValue(name)) if name == "LastPrice"));
        stream.push(dec!(140.25));
        assert_eq!(last.value(&set).unwrap(), Value::from(dec!(140.25)));
        assert_eq!(last.state().unwrap(), DataPointState::Stale);
    }
}

mod reference_tests {
    use super::*;

    #[test]
    fn fetches_once_then_caches() {
        let set = DataSet::new("Order1");
        let isin = set.add_data_point("ISIN").unwrap();
        let fetcher = CountingFetcher::new("US4592001014", 0);
        isin.set_source(Arc::new(ReferenceSource::new("ID_ISIN", "IBM US Equity", fetcher.clone())));

        assert_eq!(isin.state().unwrap(), DataPointState::Stale);
        for _ in 0..5 {
            assert_eq!(isin.value(&set).unwrap(), Value::from("US4592001014"));
        }
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(isin.state().unwrap(), DataPointState::Current);

        set.invalidate("ISIN").unwrap();
        isin.value(&set).unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn failed_fetch_stays_stale_and_retries() {
        let set = DataSet::new("Order1");
        let isin = set.add_data_point("ISIN").unwrap();
        let fetcher = CountingFetcher::new("US4592001014", 1);
        isin.set_source(Arc::new(ReferenceSource::new("ID_ISIN", "IBM US Equity", fetcher.clone())));

        let err = isin.value(&set).unwrap_err();
        assert!(matches!(err, SourceError::Fetch(FetchError { ref reason, .. }) if reason == "service unavailable"));
        assert_eq!(isin.state().unwrap(), DataPointState::Stale);

        assert_eq!(isin.value(&set).unwrap(), Value::from("US4592001014"));
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(isin.state().unwrap(), DataPointState::Current);
    }

    #[test]
    fn closure_fetcher_is_accepted() {
        let set = DataSet::new("Order1");
        let desk = set.add_data_point("Desk").unwrap();
        let fetcher: Arc<dyn ReferenceFetcher> =
            Arc::new(|_: &str, key: &str| Ok::<Value, FetchError>(Value::from(format!("desk-{}", key))));
        desk.set_source(Arc::new(ReferenceSource::new("DESK", "NY", fetcher)));
        assert_eq!(desk.value(&set).unwrap(), Value::from("desk-NY"));
    }
}

mod compound_tests {
    use super::*;

    struct PriceSet {
        set: DataSet,
        stream: Arc<StreamingSource>,
        compound: Arc<CompoundSource>,
    }

    fn price_set() -> PriceSet {
        let set = DataSet::new("Order1");
        let margin = set.add_data_point("Margin").unwrap();
        margin.set_source(Arc::new(ConstantSource::new(dec!(2.0))));

        let last = set.add_data_point("LastPrice").unwrap();
        let stream = Arc::new(StreamingSource::new("LAST_PRICE", "IBM US Equity"));
        stream.push(dec!(100.0));
        last.set_source(stream.clone());

        let new_price = set.add_data_point("NewPrice").unwrap();
        let compound = Arc::new(CompoundSource::sum());
        new_price.set_source(compound.clone());
        set.add_dependency(&new_price, &margin).unwrap();
        set.add_dependency(&new_price, &last).unwrap();

        PriceSet { set, stream, compound }
    }

    #[test]
    fn recomputes_once_until_invalidated() {
        let p = price_set();
        assert_eq!(p.set.state("NewPrice").unwrap(), DataPointState::Stale);

        for _ in 0..3 {
            assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(102.0)));
        }
        assert_eq!(p.compound.recomputes(), 1);
        assert_eq!(p.set.state("NewPrice").unwrap(), DataPointState::Current);
    }

    #[test]
    fn dependency_notification_marks_compound_stale() {
        let p = price_set();
        p.set.value("NewPrice").unwrap();

        let last = p.set.data_point("LastPrice").unwrap();
        let n = Notification::new("IBM US Equity", vec![FieldChange::new("LAST_PRICE", dec!(100.0), dec!(110.5))]);
        assert!(p.set.deliver(last.id(), &n).unwrap());

        assert_eq!(p.set.state("NewPrice").unwrap(), DataPointState::Stale);
        assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(112.5)));
        assert_eq!(p.compound.recomputes(), 2);
        assert_eq!(p.stream.ticks(), 2);
    }

    #[test]
    fn direct_push_needs_invalidate_to_reach_dependents() {
        let p = price_set();
        p.set.value("NewPrice").unwrap();

        p.stream.push(dec!(50));
        assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(102.0)));

        assert_eq!(p.set.invalidate("LastPrice").unwrap(), 1);
        assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(52)));
    }

    #[test]
    fn staleness_flows_through_chains() {
        let p = price_set();
        let spread = p.set.add_data_point("Spread").unwrap();
        spread.set_source(Arc::new(CompoundSource::new(|inputs| {
            Ok(Value::from(inputs.number("NewPrice")? * dec!(2)))
        })));
        p.set.add_dependency_by_name("Spread", "NewPrice").unwrap();

        assert_eq!(p.set.value("Spread").unwrap(), Value::from(dec!(204.0)));
        assert_eq!(p.set.dependents_of("LastPrice").unwrap(), vec!["NewPrice", "Spread"]);

        p.set.invalidate("Margin").unwrap();
        assert_eq!(p.set.stale_data_points(), vec!["LastPrice", "NewPrice", "Spread"]);
    }

    #[test]
    fn failed_dependency_surfaces_and_keeps_compound_stale() {
        let set = DataSet::new("Order1");
        let last = set.add_data_point("LastPrice").unwrap();
        last.set_source(Arc::new(StreamingSource::new("LAST_PRICE", "IBM US Equity")));
        let new_price = set.add_data_point("NewPrice").unwrap();
        new_price.set_source(Arc::new(CompoundSource::sum()));
        set.add_dependency(&new_price, &last).unwrap();

        assert!(matches!(
            set.value("NewPrice"),
            Err(DataSetError::Source(SourceError::NoValue(_)))
        ));
        assert_eq!(set.state("NewPrice").unwrap(), DataPointState::Stale);

        let report = set.refresh();
        assert_eq!(report.refreshed, 0);
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn dependency_without_source_fails_compound() {
        let set = DataSet::new("Order1");
        let orphan = set.add_data_point("X").unwrap();
        let total = set.add_data_point("Total").unwrap();
        total.set_source(Arc::new(CompoundSource::sum()));
        set.add_dependency(&total, &orphan).unwrap();

        assert_eq!(
            set.value("Total").unwrap_err(),
            DataSetError::Source(SourceError::MissingSource("X".to_string()))
        );
        assert_eq!(set.state("Total").unwrap(), DataPointState::Stale);
    }

    #[test]
    fn replacing_a_dependency_source_invalidates_dependents() {
        let p = price_set();
        assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(102.0)));

        let margin = p.set.data_point("Margin").unwrap();
        margin.set_source(Arc::new(ConstantSource::new(dec!(5))));

        assert_eq!(p.set.state("NewPrice").unwrap(), DataPointState::Stale);
        assert_eq!(p.set.value("NewPrice").unwrap(), Value::from(dec!(105.0)));
        assert_eq!(p.compound.recomputes(), 2);
    }

    #[test]
    fn reading_through_another_data_set_is_rejected() {
        fn layout(name: &str, x: i64) -> DataSet {
            let set = DataSet::new(name);
            let x_point = set.add_data_point("X").unwrap();
            x_point.set_source(Arc::new(ConstantSource::new(x)));
            let sum = set.add_data_point("S").unwrap();
            sum.set_source(Arc::new(CompoundSource::sum()));
            set.add_dependency(&sum, &x_point).unwrap();
            set
        }

        let a = layout("OrderA", 1);
        let b = layout("OrderB", 1000);
        let sum = a.data_point("S").unwrap();

        assert!(matches!(
            sum.value(&b),
            Err(SourceError::ForeignDataSet { ref owner, ref data_set, .. })
                if owner == "OrderA" && data_set == "OrderB"
        ));
        assert_eq!(a.state("S").unwrap(), DataPointState::Stale);
        assert_eq!(a.value("S").unwrap(), Value::from(1));
    }

    #[test]
    fn same_name_is_not_membership() {
        let a = DataSet::new("Order1");
        let b = DataSet::new("Order1");
        let margin = a.add_data_point("Margin").unwrap();
        margin.set_source(Arc::new(ConstantSource::new(dec!(2.0))));
        b.add_data_point("Margin").unwrap();

        assert!(matches!(margin.value(&b), Err(SourceError::ForeignDataSet { .. })));
        assert_eq!(margin.value(&a).unwrap(), Value::from(dec!(2.0)));
    }
}
