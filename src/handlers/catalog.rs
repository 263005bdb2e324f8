//! The fixed set of integrations this bot ships with.
//!
//! Each function returns a descriptor; [`reference`] wires them to the URLs
//! from `[integrations]`.

use super::{HandlerDescriptor, HttpMethod, PayloadPlacement};
use crate::config::IntegrationsConfig;
use crate::schema::{DerivedField, ExtractionSchema, FieldKind};

pub const DEPOSIT_AGENT: &str = "deposit_agent";
pub const SIX_SIGMA_AGENT: &str = "six_sigma_agent";

/// Compound-interest calculator with monthly capitalisation.
pub fn deposit(url: &str) -> HandlerDescriptor {
    let schema = ExtractionSchema::new("DepositSchema", format!("Параметры депозита для запроса к {url}."))
        .optional("periods", FieldKind::Integer, "продолжительность депозита в месяцах")
        .optional("amount", FieldKind::Integer, "начальная сумма депозита")
        .optional("rate", FieldKind::Number, "годовая процентная ставка по депозиту");

    HandlerDescriptor::api(DEPOSIT_AGENT, HttpMethod::Post, url, PayloadPlacement::Body)
        .mission("Рассчитать депозит с ежемесячной капитализацией процентов")
        .example("500k на полтора года под 7.2%")
        .example("на 6 мес. под 8%, сумма 1 млн.")
        .example("200 тысяч, 3 месяца, ставка 6")
        .schema(schema)
        // first capitalisation date
        .derive(DerivedField::DateAfterMonths {
            name: "date".into(),
            months: 1,
            format: "%d.%m.%Y".into(),
        })
}

/// Six-sigma process analyzer; answers with a PNG chart.
pub fn six_sigma(url: &str) -> HandlerDescriptor {
    let schema = ExtractionSchema::new("SixSigmaSchema", format!("Параметры процесса для запроса к {url}."))
        .required(
            "tests",
            FieldKind::Integer,
            "общее количество экземпляров, случаев, исходов или тестов",
        )
        .required(
            "fails",
            FieldKind::Integer,
            "количество экземпляров, случаев, исходов или тестов, \
             завершившихся неудачей, сбоем или дефектом",
        )
        .optional(
            "name",
            FieldKind::String,
            "имя, метка или кодовое обозначение процесса или изделия",
        );

    HandlerDescriptor::api(SIX_SIGMA_AGENT, HttpMethod::Get, url, PayloadPlacement::Query)
        .mission("Оценить процесс по методике \"6 сигм\"")
        .example("total 100, nok 5, name Example Process")
        .example("ok 95, nok 5")
        .example("бракованных 5, всего 100")
        .example("пять дефектных из ста штук")
        .example("пять неудач из ста случаев")
        .example("из ста тестов пять провалены")
        .example("из сотни пять плохих, изделие - SSD")
        .example("хороших 95, всего 100")
        .example("из 100 результатов 95 успешных исходов")
        .schema(schema)
}

/// Both integrations in menu order.
pub fn reference(cfg: &IntegrationsConfig) -> Vec<HandlerDescriptor> {
    vec![deposit(&cfg.deposit_url), six_sigma(&cfg.six_sigma_url)]
}
