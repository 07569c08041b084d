use pagelens_tools::browser::format::format_snapshot;

use super::Session;

/// Open `url`, snapshot it and print the tree or the search result.
pub async fn run(url: &str, search: Option<&str>, context: Option<usize>) -> anyhow::Result<()> {
    let session = Session::start(Some(url)).await?;
    let result = print_snapshot(&session, search, context).await;
    session.shutdown().await;
    result
}

async fn print_snapshot(session: &Session, search: Option<&str>, context: Option<usize>) -> anyhow::Result<()> {
    let manager = &session.ctx.manager;
    let tab = session.ctx.backend.active_tab().await?;
    let snapshot = manager.create_snapshot(tab.id).await?;

    println!("# {} ({})", snapshot.title, snapshot.url);
    match search {
        Some(query) => {
            let levels = context.unwrap_or(session.ctx.config.search.default_context_levels);
            match manager.search_and_format(tab.id, query, levels) {
                Some(text) => print!("{}", text),
                None => println!("No matches found"),
            }
        }
        None => print!("{}", format_snapshot(&snapshot)),
    }
    Ok(())
}
