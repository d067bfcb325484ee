use std::sync::Arc;

use common::config::Settings;
use common::storage::{ObjectStorage, ObjectStoreStorage};
use etl::{ExtractFormat, RawExtractReader};
use object_store::memory::InMemory;
use warehouse::convert::{i64_column, string_column};
use warehouse::dimensions::{TaxpayerDimensionRow, TimeDimensionRow};
use warehouse::pipeline::{PipelineConfig, WarehousePipeline};
use warehouse::warehouse::Warehouse;

const HEADER: &str = "NUMERO_RUC;RAZON_SOCIAL;FECHA_AUTORIZACIÓN_OFICIO\n";

const SETTINGS: &str = r#"
    [storage]
    access_key = "minio"
    secret_key = "minio123"

    [retry]
    max_retries = 0
    base_delay_ms = 1
"#;

async fn source(files: &[(&str, &str)]) -> Arc<dyn ObjectStorage> {
    let storage = ObjectStoreStorage::new(Arc::new(InMemory::new()), "etl-autorizaciones-datos");
    for (name, rows) in files {
        let body = format!("{HEADER}{rows}");
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&body);
        storage.put_object(name, &bytes).await.unwrap();
    }
    Arc::new(storage)
}

fn pipeline(source: Arc<dyn ObjectStorage>, files: &[&str], store: Arc<InMemory>) -> WarehousePipeline {
    let settings = Settings::from_toml_str(SETTINGS).unwrap();
    let config = PipelineConfig {
        files: files.iter().map(|f| f.to_string()).collect(),
        ..PipelineConfig::from_settings(&settings).unwrap()
    };
    let reader = RawExtractReader::new(source, ExtractFormat::default());
    let warehouse = Warehouse::new(store, "warehouse", "dw_autorizaciones").unwrap();
    WarehousePipeline::new(config, reader, warehouse)
}

fn extracts() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "2022.csv",
            "0912345678001;COMERCIAL GUAYAS;15/03/2022 10:00:00\n\
             1760001234001;MINISTERIO;15/03/2022\n\
             1760001234001;MINISTERIO;15/03/2022 16:45\n\
             0992345678001;SOCIEDAD SIN FECHA;fecha invalida\n\
             ABC;MALFORMADO;01/01/2022\n",
        ),
        (
            "2023.csv",
            "912345678001;COMERCIAL GUAYAS RENOMBRADA;01/02/2023\n",
        ),
    ]
}

#[tokio::test]
async fn full_run_builds_the_star_schema() {
    let store = Arc::new(InMemory::new());
    let pipeline = pipeline(source(&extracts()).await, &["2022.csv", "2023.csv"], store);

    let report = pipeline.run().await.unwrap();
    let names: Vec<_> = report.tasks.iter().map(|t| t.task.as_str()).collect();
    assert_eq!(&names[3..], &["cargar_dim_contribuyente", "cargar_hechos_autorizaciones"]);

    let warehouse = pipeline.warehouse();

    let time: Vec<TimeDimensionRow> = warehouse.read_table().await.unwrap();
    assert_eq!(time.len(), 1096);
    assert!(time.iter().enumerate().all(|(i, t)| t.id_fecha == i as i64 + 1));

    let taxpayers: Vec<TaxpayerDimensionRow> = warehouse.read_table().await.unwrap();
    let ids: Vec<_> = taxpayers.iter().map(|t| t.identifier.as_str()).collect();
    assert_eq!(ids, vec!["0912345678001", "1760001234001", "0992345678001"]);
    // earlier file wins over the renamed record in 2023
    assert_eq!(taxpayers[0].display_name, "COMERCIAL GUAYAS");
    assert_eq!(taxpayers[0].id_geografia, Some(9));
    assert_eq!(taxpayers[1].id_geografia, Some(17));

    let batches = warehouse
        .query(
            "SELECT c.numero_ruc, t.fecha, f.cantidad_autorizaciones \
             FROM hechos_autorizaciones f \
             JOIN dim_contribuyente c ON f.id_contribuyente = c.id_contribuyente \
             JOIN dim_tiempo t ON f.id_fecha = t.id_fecha \
             ORDER BY f.id_fecha, f.id_contribuyente",
        )
        .await
        .unwrap();

    let mut facts = Vec::new();
    for batch in &batches {
        let ruc = string_column(batch, "numero_ruc").unwrap();
        let cantidad = i64_column(batch, "cantidad_autorizaciones").unwrap();
        for i in 0..batch.num_rows() {
            facts.push((ruc.value(i).to_string(), cantidad.value(i)));
        }
    }
    assert_eq!(
        facts,
        vec![
            ("0912345678001".to_string(), 1),
            ("1760001234001".to_string(), 2),
            ("0912345678001".to_string(), 1),
        ]
    );
    // the taxpayer whose only event had no usable date never reaches the facts
    assert!(facts.iter().all(|(ruc, _)| ruc != "0992345678001"));
}

#[tokio::test]
async fn entity_types_follow_the_third_digit() {
    let store = Arc::new(InMemory::new());
    let pipeline = pipeline(source(&extracts()).await, &["2022.csv", "2023.csv"], store);
    pipeline.run().await.unwrap();

    let batches = pipeline
        .warehouse()
        .query(
            "SELECT c.numero_ruc, e.tipo \
             FROM dim_contribuyente c \
             JOIN dim_tipo_ruc e ON c.id_tipo = e.id_tipo \
             ORDER BY c.id_contribuyente",
        )
        .await
        .unwrap();

    let mut tipos = Vec::new();
    for batch in &batches {
        let tipo = string_column(batch, "tipo").unwrap();
        for i in 0..batch.num_rows() {
            tipos.push(tipo.value(i).to_string());
        }
    }
    assert_eq!(tipos, vec!["Natural", "Pública", "Privada"]);
}

#[tokio::test]
async fn rerunning_produces_identical_tables() {
    let store = Arc::new(InMemory::new());
    let source = source(&extracts()).await;

    let first = pipeline(Arc::clone(&source), &["2022.csv", "2023.csv"], Arc::clone(&store))
        .run()
        .await
        .unwrap();
    let second = pipeline(source, &["2022.csv", "2023.csv"], store)
        .run()
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    for task in &first.tasks {
        let again = second.task(&task.task).unwrap();
        assert_eq!(task.checksum, again.checksum, "{} changed between runs", task.table);
        assert_eq!(task.rows, again.rows);
    }
}

#[tokio::test]
async fn scenario_identifiers_resolve_to_their_regions() {
    let store = Arc::new(InMemory::new());
    let source = source(&[(
        "2024.csv",
        "0912345678001;GUAYAQUIL;02/01/2024\n1709876543006;QUITO;03/01/2024\n",
    )])
    .await;
    let pipeline = pipeline(source, &["2024.csv"], store);
    pipeline.run().await.unwrap();

    let taxpayers: Vec<TaxpayerDimensionRow> = pipeline.warehouse().read_table().await.unwrap();
    assert_eq!(taxpayers.len(), 2);
    let regions: Vec<_> = taxpayers
        .iter()
        .map(|t| t.identifier.region().as_str().to_string())
        .collect();
    assert_eq!(regions, vec!["09", "17"]);
    assert_eq!(taxpayers[0].id_geografia, Some(9));
    assert_eq!(taxpayers[1].id_geografia, Some(17));
}
