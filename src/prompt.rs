use crate::error::{InsightsError, Result};
use crate::schema::{AggregatedRecord, Month};

/// Hard cap on the number of rows embedded in a single prompt.
pub const MAX_PROMPT_ROWS: usize = 500;

pub const NO_DATA_STRUCTURE: &str = "Sem dados disponíveis";

const ANALYST_PREAMBLE: &str = "Você é um analista de dados especializado em vendas. \
Você TEM CAPACIDADE de processar e analisar dados JSON.";

const ANALYSIS_INSTRUCTIONS: &str = r#"**INSTRUÇÕES IMPORTANTES:**
1. Você DEVE processar os dados JSON fornecidos acima
2. Você PODE e DEVE fazer cálculos matemáticos (somas, médias, porcentagens, etc.)
3. Analise os dados reais, NÃO use placeholders como "R$ X" ou "R$ Y"
4. Forneça números específicos e exatos extraídos dos dados
5. Identifique os nomes reais das colunas nos dados (elas podem variar)
6. Use a coluna que representa valor/receita para cálculos financeiros
7. Use a coluna "mes" para agrupar por mês"#;

const RESPONSE_FORMAT: &str = r#"**FORMATO DE RESPOSTA:**
- Forneça números reais e específicos
- Mostre cálculos quando relevante
- Seja direto e objetivo
- Inclua insights acionáveis ao final"#;

/// Describes the columns available to the model, taken from the first record.
pub fn data_structure(rows: &[AggregatedRecord]) -> String {
    match rows.first() {
        Some(first) => format!(
            "Colunas disponíveis: {}",
            first.columns().collect::<Vec<_>>().join(", ")
        ),
        None => NO_DATA_STRUCTURE.to_string(),
    }
}

/// Builds the analyst prompt for `question` over the aggregated sales rows.
///
/// Only the first [`MAX_PROMPT_ROWS`] rows are embedded, but the summary always
/// reports the full row count. Fails with [`InsightsError::NoData`] when there is
/// nothing to analyse, in which case no request should be sent.
pub fn build_prompt(
    rows: &[AggregatedRecord],
    question: &str,
    loaded_months: &[Month],
) -> Result<String> {
    if rows.is_empty() {
        return Err(InsightsError::NoData);
    }

    let embedded = &rows[..rows.len().min(MAX_PROMPT_ROWS)];
    let data_json = serde_json::to_string_pretty(embedded)?;
    let month_names = loaded_months
        .iter()
        .map(|m| m.name())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "{preamble}\n\n\
        **DADOS DE VENDAS (formato JSON):**\n\
        {data}\n\n\
        **INFORMAÇÕES:**\n\
        - Total de transações disponíveis: {total}\n\
        - Meses com dados: {months}\n\
        - {structure}\n\n\
        {instructions}\n\n\
        **PERGUNTA DO USUÁRIO:** {question}\n\n\
        {format}",
        preamble = ANALYST_PREAMBLE,
        data = data_json,
        total = rows.len(),
        months = month_names,
        structure = data_structure(rows),
        instructions = ANALYSIS_INSTRUCTIONS,
        question = question,
        format = RESPONSE_FORMAT,
    ))
}
