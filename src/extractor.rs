use crate::{AppError, Field, ResumeRecord, Result, NOT_SPECIFIED};
use scraper::{ElementRef, Html, Selector};
use tracing::instrument;

/// Fallback for the total experience when the page has no experience block at all.
const NO_EXPERIENCE: &str = "Опыт не указан";
/// Fallback for the skills field when the page lists no skill tags.
const NO_SKILLS: &str = "Навыки не указаны";

/// Phrase found in the paragraph carrying the address and relocation readiness.
/// It also matches the negated "не готов к переезду".
const RELOCATION_MARKER: &str = "готов к переезду";
const EMPLOYMENT_MARKERS: &[&str] = &["Занятость:", "График работы:"];

/// How the value of a single field is located in a résumé page.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Text of the first element matching the selector.
    Text(Selector),
    /// Text of every matching element, each defaulted on its own, joined together.
    All { selector: Selector, separator: &'static str },
    /// Two independently defaulted values joined together.
    Pair {
        first: Selector,
        second: Selector,
        separator: &'static str,
    },
    /// The paragraph mentioning relocation readiness, or else the paragraph wrapping
    /// the address element.
    Location { marker: &'static str, address: Selector },
    /// Every paragraph whose own text mentions one of the markers.
    ParagraphsContaining {
        markers: &'static [&'static str],
        separator: &'static str,
    },
    /// Text of `inner` inside the first `scope`. Absent scope yields the field fallback,
    /// absent inner the generic placeholder.
    Within { scope: Selector, inner: Selector },
    /// "{position} в {company}" of the first job item in the experience block.
    LastJob {
        scope: Selector,
        item: Selector,
        position: Selector,
        company: Selector,
    },
    /// Text of `inner` inside the first job item of the experience block.
    LastJobDetail {
        scope: Selector,
        item: Selector,
        inner: Selector,
    },
    /// The address of the page itself.
    SourceUrl,
}

/// A field paired with the rule locating it and the value used when the rule finds nothing.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pub rule: Rule,
    pub fallback: &'static str,
}

/// The `ResumeExtractor` maps a parsed résumé page to a `ResumeRecord`.
/// Extraction is total: every field gets either its text or its fallback.
pub struct ResumeExtractor {
    rules: Vec<FieldRule>,
}

impl ResumeExtractor {
    /// Creates a `ResumeExtractor` with the rule table for hh.ru résumé pages.
    ///
    /// # Returns
    ///
    /// A `Result` containing the extractor, or an error if one of the selectors fails to parse.
    pub fn new() -> Result<Self> {
        let experience_block = r#"div[data-qa="resume-block-experience"]"#;
        let job_item = "div.resume-block-item-gap";

        let rules = vec![
            FieldRule {
                field: Field::FullName,
                rule: Rule::Text(parse(r#"h2[data-qa="bloko-header-1"]"#)?),
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::DesiredPosition,
                rule: Rule::Text(parse(r#"span[data-qa="resume-block-title-position"]"#)?),
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Salary,
                rule: Rule::Text(parse(r#"span[data-qa="resume-block-salary"]"#)?),
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::PersonalInfo,
                rule: Rule::Pair {
                    first: parse(r#"span[data-qa="resume-personal-gender"]"#)?,
                    second: parse(r#"span[data-qa="resume-personal-age"]"#)?,
                    separator: ", ",
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Location,
                rule: Rule::Location {
                    marker: RELOCATION_MARKER,
                    address: parse(r#"span[data-qa="resume-personal-address"]"#)?,
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Employment,
                rule: Rule::ParagraphsContaining {
                    markers: EMPLOYMENT_MARKERS,
                    separator: ", ",
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::TotalExperience,
                rule: Rule::Within {
                    scope: parse(experience_block)?,
                    inner: parse("span.resume-block__title-text_sub")?,
                },
                fallback: NO_EXPERIENCE,
            },
            FieldRule {
                field: Field::LastJob,
                rule: Rule::LastJob {
                    scope: parse(experience_block)?,
                    item: parse(job_item)?,
                    position: parse(r#"div[data-qa="resume-block-experience-position"]"#)?,
                    company: parse(r#"div[class="bloko-text bloko-text_strong"]"#)?,
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::LastJobDescription,
                rule: Rule::LastJobDetail {
                    scope: parse(experience_block)?,
                    item: parse(job_item)?,
                    inner: parse(r#"div[data-qa="resume-block-experience-description"]"#)?,
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Skills,
                rule: Rule::All {
                    selector: parse(r#"[data-qa="bloko-tag__text"]"#)?,
                    separator: ", ",
                },
                fallback: NO_SKILLS,
            },
            FieldRule {
                field: Field::About,
                rule: Rule::Text(parse(r#"div[data-qa="resume-block-skills-content"]"#)?),
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Education,
                rule: Rule::All {
                    selector: parse(r#"[data-qa="resume-block-education-item"]"#)?,
                    separator: "; ",
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Languages,
                rule: Rule::All {
                    selector: parse(r#"[data-qa="resume-block-language-item"]"#)?,
                    separator: ", ",
                },
                fallback: NOT_SPECIFIED,
            },
            FieldRule {
                field: Field::Url,
                rule: Rule::SourceUrl,
                fallback: NOT_SPECIFIED,
            },
        ];

        Ok(Self { rules })
    }

    /// The rule table, in column order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Parses the given HTML string and extracts a record from it.
    ///
    /// # Arguments
    ///
    /// * `html` - The HTML string to be parsed.
    /// * `url` - The URL of the résumé page.
    ///
    /// # Returns
    ///
    /// The extracted `ResumeRecord`.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn extract(&self, html: &str, url: &str) -> ResumeRecord {
        let document = Html::parse_document(html);
        self.extract_document(&document, url)
    }

    /// Applies every rule to an already parsed document.
    pub fn extract_document(&self, document: &Html, url: &str) -> ResumeRecord {
        let mut record = ResumeRecord::unspecified(url);
        for rule in &self.rules {
            let value = self
                .apply(document, &rule.rule, url)
                .unwrap_or_else(|| rule.fallback.to_string());
            record.set(rule.field, value);
        }
        record
    }

    /// Evaluates a single rule. `None` means the rule found nothing and the field
    /// fallback applies.
    fn apply(&self, document: &Html, rule: &Rule, url: &str) -> Option<String> {
        match rule {
            Rule::Text(selector) => document.select(selector).next().and_then(non_empty_text),
            Rule::All {
                selector,
                separator,
            } => join_defaulted(document.select(selector), separator),
            Rule::Pair {
                first,
                second,
                separator,
            } => {
                let first = text_or_default(document.select(first).next());
                let second = text_or_default(document.select(second).next());
                Some(format!("{first}{separator}{second}"))
            }
            Rule::Location { marker, address } => {
                let paragraph = paragraphs(document).find(|p| own_text(*p).contains(marker));
                match paragraph {
                    Some(p) => Some(text_or_default(Some(p))),
                    None => document
                        .select(address)
                        .next()
                        .map(|span| text_or_default(enclosing_paragraph(span))),
                }
            }
            Rule::ParagraphsContaining { markers, separator } => {
                let matching = paragraphs(document).filter(|p| {
                    let text = own_text(*p);
                    markers.iter().any(|m| text.contains(m))
                });
                join_defaulted(matching, separator)
            }
            Rule::Within { scope, inner } => document
                .select(scope)
                .next()
                .map(|block| text_or_default(block.select(inner).next())),
            Rule::LastJob {
                scope,
                item,
                position,
                company,
            } => first_job(document, scope, item).map(|job| {
                let company = text_or_default(job.select(company).next());
                let position = text_or_default(job.select(position).next());
                format!("{position} в {company}")
            }),
            Rule::LastJobDetail { scope, item, inner } => {
                first_job(document, scope, item).map(|job| text_or_default(job.select(inner).next()))
            }
            Rule::SourceUrl => Some(url.to_string()),
        }
    }
}

/// Joins text fragments with single spaces, turns thin and no-break spaces into
/// ordinary ones, collapses whitespace runs and trims the result.
///
/// # Arguments
///
/// * `fragments` - The text nodes of an element, in document order.
///
/// # Returns
///
/// The normalized text, possibly empty.
pub fn normalize_text<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let joined = fragments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{2009}', '\u{a0}'], " ");

    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text of an element, or the placeholder when the element is absent
/// or has no visible text.
pub fn text_or_default(element: Option<ElementRef<'_>>) -> String {
    element
        .and_then(non_empty_text)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn non_empty_text(element: ElementRef<'_>) -> Option<String> {
    let text = normalize_text(element.text());
    (!text.is_empty()).then_some(text)
}

/// `None` when there are no elements; otherwise every element's text, defaulted
/// individually and joined with `separator`.
fn join_defaulted<'a>(
    elements: impl Iterator<Item = ElementRef<'a>>,
    separator: &str,
) -> Option<String> {
    let values = elements.map(|e| text_or_default(Some(e))).collect::<Vec<_>>();
    (!values.is_empty()).then(|| values.join(separator))
}

/// Text held directly by the element, ignoring its child elements.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect()
}

fn paragraphs<'a>(document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "p")
}

fn enclosing_paragraph(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "p")
}

fn first_job<'a>(document: &'a Html, scope: &Selector, item: &Selector) -> Option<ElementRef<'a>> {
    document.select(scope).next()?.select(item).next()
}

fn parse(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| AppError::ExtractionError(format!("invalid selector {css:?}: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://hh.ru/resume/abc123";

    fn full_page() -> &'static str {
        r#"
            <!DOCTYPE html>
            <html>
                <body>
                    <h2 data-qa="bloko-header-1">Иванов   Иван</h2>
                    <p>
                        <span data-qa="resume-personal-gender">Мужчина</span>,
                        <span data-qa="resume-personal-age">30&nbsp;лет</span>
                    </p>
                    <p>Москва, не готов к переезду, готов к командировкам</p>
                    <span data-qa="resume-block-title-position">C# Разработчик</span>
                    <span data-qa="resume-block-salary">250&thinsp;000&nbsp;₽ на руки</span>
                    <p>Занятость: полная занятость</p>
                    <p>График работы: удаленная работа</p>
                    <div data-qa="resume-block-experience">
                        <h2><span class="resume-block__title-text resume-block__title-text_sub">Опыт работы 5 лет 2 месяца</span></h2>
                        <div class="resume-block-item-gap">
                            <div class="bloko-text bloko-text_strong">ООО Ромашка</div>
                            <div data-qa="resume-block-experience-position">Ведущий разработчик</div>
                            <div data-qa="resume-block-experience-description">Разработка
                                бэкенда на .NET</div>
                        </div>
                        <div class="resume-block-item-gap">
                            <div class="bloko-text bloko-text_strong">ЗАО Лютик</div>
                            <div data-qa="resume-block-experience-position">Разработчик</div>
                        </div>
                    </div>
                    <span data-qa="bloko-tag__text">C#</span>
                    <span data-qa="bloko-tag__text">ASP.NET Core</span>
                    <span data-qa="bloko-tag__text">PostgreSQL</span>
                    <div data-qa="resume-block-skills-content"><p>Люблю <b>чистый</b> код.</p></div>
                    <div data-qa="resume-block-education-item">2015 МГУ</div>
                    <div data-qa="resume-block-education-item">2017 МФТИ</div>
                    <p data-qa="resume-block-language-item">Русский — Родной</p>
                    <p data-qa="resume-block-language-item">Английский — B2</p>
                </body>
            </html>
        "#
    }

    /// Tests extraction of every field from a complete résumé page.
    #[test]
    fn test_full_page_extraction() {
        let extractor = ResumeExtractor::new().unwrap();
        let record = extractor.extract(full_page(), URL);

        assert_eq!(record.full_name, "Иванов Иван");
        assert_eq!(record.personal_info, "Мужчина, 30 лет");
        assert_eq!(record.location, "Москва, не готов к переезду, готов к командировкам");
        assert_eq!(record.desired_position, "C# Разработчик");
        assert_eq!(record.salary, "250 000 ₽ на руки");
        assert_eq!(
            record.employment,
            "Занятость: полная занятость, График работы: удаленная работа"
        );
        assert_eq!(record.total_experience, "Опыт работы 5 лет 2 месяца");
        assert_eq!(record.last_job, "Ведущий разработчик в ООО Ромашка");
        assert_eq!(record.last_job_description, "Разработка бэкенда на .NET");
        assert_eq!(record.skills, "C#, ASP.NET Core, PostgreSQL");
        assert_eq!(record.about, "Люблю чистый код.");
        assert_eq!(record.education, "2015 МГУ; 2017 МФТИ");
        assert_eq!(record.languages, "Русский — Родной, Английский — B2");
        assert_eq!(record.url, URL);
    }

    /// Tests that every missing node falls back to its placeholder.
    #[test]
    fn test_empty_page_uses_fallbacks() {
        let extractor = ResumeExtractor::new().unwrap();
        let record = extractor.extract("<html><body></body></html>", URL);

        assert_eq!(record.full_name, NOT_SPECIFIED);
        assert_eq!(record.desired_position, NOT_SPECIFIED);
        assert_eq!(record.salary, NOT_SPECIFIED);
        assert_eq!(record.personal_info, "Не указано, Не указано");
        assert_eq!(record.location, NOT_SPECIFIED);
        assert_eq!(record.employment, NOT_SPECIFIED);
        assert_eq!(record.total_experience, NO_EXPERIENCE);
        assert_eq!(record.last_job, NOT_SPECIFIED);
        assert_eq!(record.last_job_description, NOT_SPECIFIED);
        assert_eq!(record.skills, NO_SKILLS);
        assert_eq!(record.about, NOT_SPECIFIED);
        assert_eq!(record.education, NOT_SPECIFIED);
        assert_eq!(record.languages, NOT_SPECIFIED);
        assert_eq!(record.url, URL);
    }

    /// A node whose text is only whitespace counts as missing.
    #[test]
    fn test_blank_node_is_not_specified() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = "<h2 data-qa=\"bloko-header-1\"> \u{a0} \u{2009} </h2>";
        let record = extractor.extract(html, URL);

        assert_eq!(record.full_name, NOT_SPECIFIED);
    }

    /// Tests the location read from the address paragraph when no relocation
    /// paragraph is present.
    #[test]
    fn test_location_from_address_paragraph() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"
            <p>Проживает: <span data-qa="resume-personal-address">Санкт-Петербург</span>, м. Невский проспект</p>
        "#;
        let record = extractor.extract(html, URL);

        assert_eq!(
            record.location,
            "Проживает: Санкт-Петербург , м. Невский проспект"
        );
    }

    /// The relocation paragraph wins over the address paragraph, even when it
    /// comes later in the page.
    #[test]
    fn test_location_prefers_relocation_paragraph() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"
            <p>Проживает: <span data-qa="resume-personal-address">Москва</span></p>
            <p>Москва, готов к переезду, не готов к командировкам</p>
        "#;
        let record = extractor.extract(html, URL);

        assert_eq!(
            record.location,
            "Москва, готов к переезду, не готов к командировкам"
        );
    }

    #[test]
    fn test_location_address_without_paragraph() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"<div><span data-qa="resume-personal-address">Казань</span></div>"#;
        let record = extractor.extract(html, URL);

        assert_eq!(record.location, NOT_SPECIFIED);
    }

    /// An experience block without the subtitle or job items still yields the
    /// generic placeholder rather than the "no experience" one.
    #[test]
    fn test_experience_block_without_details() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"<div data-qa="resume-block-experience"><p>Пусто</p></div>"#;
        let record = extractor.extract(html, URL);

        assert_eq!(record.total_experience, NOT_SPECIFIED);
        assert_eq!(record.last_job, NOT_SPECIFIED);
        assert_eq!(record.last_job_description, NOT_SPECIFIED);
    }

    #[test]
    fn test_last_job_with_missing_parts() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"
            <div data-qa="resume-block-experience">
                <div class="resume-block-item-gap">
                    <div class="bloko-text">Not the company</div>
                    <div data-qa="resume-block-experience-position">Тимлид</div>
                </div>
            </div>
        "#;
        let record = extractor.extract(html, URL);

        assert_eq!(record.last_job, "Тимлид в Не указано");
        assert_eq!(record.last_job_description, NOT_SPECIFIED);
    }

    /// Empty items inside a multi-valued field are defaulted one by one.
    #[test]
    fn test_multi_valued_items_defaulted_individually() {
        let extractor = ResumeExtractor::new().unwrap();
        let html = r#"
            <div data-qa="resume-block-education-item">2015 МГУ</div>
            <div data-qa="resume-block-education-item">   </div>
        "#;
        let record = extractor.extract(html, URL);

        assert_eq!(record.education, "2015 МГУ; Не указано");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text(["  100\u{2009}000\u{a0}₽ ", "", "\n\t на руки  "]),
            "100 000 ₽ на руки"
        );
        assert_eq!(normalize_text(["   ", "\u{a0}"]), "");
        assert_eq!(normalize_text(Vec::<&str>::new()), "");
    }

    /// The rule table covers each field exactly once, in column order.
    #[test]
    fn test_rule_table_is_total() {
        let extractor = ResumeExtractor::new().unwrap();
        let fields = extractor.rules().iter().map(|r| r.field).collect::<Vec<_>>();

        assert_eq!(fields, Field::ALL.to_vec());
    }
}
